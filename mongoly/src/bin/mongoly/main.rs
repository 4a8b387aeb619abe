mod commands;
mod context;
mod output;
mod theme;

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::builder::Styles;
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::control::ShouldColorize;
use once_cell::sync::Lazy;

use commands::{check, indexes, plan, schema};
use output::{OutputFormat, OutputSettings, Reporter};
use theme::Tone;

const ENVIRONMENT: &[(&str, &str)] = &[
    ("MONGOLY_MANIFEST", "Manifest to load, same as --manifest"),
    ("RUST_LOG", "Synthesis diagnostics, e.g. RUST_LOG=mongoly=debug"),
    ("NO_COLOR", "Disable colored output"),
];

/// Example invocations appended to `mongoly <command> --help`.
const USAGE: &[(&str, &[&str])] = &[
    ("schema", schema::USAGE),
    ("indexes", indexes::USAGE),
    ("plan", plan::USAGE),
    ("check", check::USAGE),
];

static HELP_STYLES: Lazy<Styles> = Lazy::new(|| {
    Styles::styled()
        .usage(Tone::Heading.style().bold())
        .header(Tone::Heading.style().bold())
        .literal(Tone::Example.style())
        .placeholder(Tone::Note.style())
        .valid(Tone::Passed.style())
        .invalid(Tone::Warned.style())
        .error(Tone::Failed.style().bold())
});

#[derive(Parser)]
#[command(name = "mongoly")]
#[command(version)]
#[command(
    about = "Inspect MongoDB validators and indexes synthesized from document metadata",
    long_about = r#"Metadata CLI for mongoly that provides:

• $jsonSchema validators synthesized from a document manifest
• Index descriptions including nested dotted paths
• Per-collection plans ready to hand to a database client
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Manifest to load instead of the one configured in mongoly.toml
    #[arg(long, global = true, env = "MONGOLY_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Only print errors
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Also print synthesis statistics
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show synthesized schemas ($jsonSchema validators)
    Schema(schema::SchemaArgs),

    /// Show derived indexes, including nested paths
    Indexes(indexes::IndexesArgs),

    /// Show collection names, validators and indexes per document
    Plan,

    /// Synthesize every document and report configuration errors
    Check,
}

fn cli_command(use_color: bool) -> Command {
    let mut command = Cli::command()
        .styles(HELP_STYLES.clone())
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never })
        .after_long_help(environment_help(use_color));
    for &(name, lines) in USAGE {
        if let Some(subcommand) = command.find_subcommand_mut(name) {
            *subcommand = subcommand.clone().after_long_help(usage_help(lines, use_color));
        }
    }
    command
}

fn usage_help(lines: &[&str], use_color: bool) -> String {
    let mut help = Tone::Heading.paint("Examples:", use_color);
    for line in lines {
        let _ = write!(help, "\n  {}", Tone::Example.paint(line, use_color));
    }
    help
}

fn environment_help(use_color: bool) -> String {
    let mut help = Tone::Heading.paint("Environment:", use_color);
    for (key, description) in ENVIRONMENT {
        let key = Tone::Example.paint(&format!("{key:<18}"), use_color);
        let _ = write!(help, "\n  {key}{description}");
    }
    help
}

fn run(command: Commands, manifest: Option<&Path>, reporter: &Reporter) -> Result<()> {
    match command {
        Commands::Schema(args) => schema::handle_schema(args, manifest, reporter),
        Commands::Indexes(args) => indexes::handle_indexes(args, manifest, reporter),
        Commands::Plan => plan::handle_plan(manifest, reporter),
        Commands::Check => check::handle_check(manifest, reporter),
    }
}

fn main() {
    env_logger::init();

    let use_color = ShouldColorize::from_env().should_colorize();
    let matches = cli_command(use_color).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    if cli.no_color {
        colored::control::set_override(false);
    }

    let reporter = Reporter::new(OutputSettings {
        format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        color: use_color && !cli.no_color,
    });
    if let Err(err) = run(cli.command, cli.manifest.as_deref(), &reporter) {
        reporter.status(Tone::Failed, &format!("{err:#}"));
        std::process::exit(1);
    }
}
