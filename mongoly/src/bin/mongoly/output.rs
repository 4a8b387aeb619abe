use anyhow::Result;
use clap::ValueEnum;
use comfy_table::presets::{ASCII_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, Color, Table};
use serde::Serialize;

use crate::theme::Tone;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One table per report
    #[default]
    Table,
    /// Pretty-printed JSON, ready to hand to a database client
    Json,
    /// One line per document or collection
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub color: bool,
}

/// A command result printable in every [`OutputFormat`]. JSON output is the `Serialize` form.
pub trait Report: Serialize {
    fn columns(&self) -> &'static [&'static str];
    fn rows(&self) -> Vec<Vec<String>>;
    fn compact(&self) -> String;
}

pub fn render_table<R: Report>(report: &R, color: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(if color { UTF8_FULL_CONDENSED } else { ASCII_FULL });
    table.set_header(report.columns().iter().map(|column| {
        let cell = Cell::new(column).add_attribute(Attribute::Bold);
        if color { cell.fg(Color::Cyan) } else { cell }
    }));
    for row in report.rows() {
        table.add_row(row);
    }
    table
}

/// Prints reports and status lines according to the global flags.
pub struct Reporter {
    settings: OutputSettings,
}

impl Reporter {
    pub fn new(settings: OutputSettings) -> Self {
        Self { settings }
    }

    pub fn report<R: Report>(&self, report: &R) -> Result<()> {
        if self.settings.quiet {
            return Ok(());
        }
        match self.settings.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            OutputFormat::Table => println!("{}", render_table(report, self.settings.color)),
            OutputFormat::Compact => println!("{}", report.compact()),
        }
        Ok(())
    }

    /// Failures go to stderr and survive `--quiet`.
    pub fn status(&self, tone: Tone, message: &str) {
        let line = self.status_line(tone, message);
        if tone == Tone::Failed {
            eprintln!("{line}");
        } else if !self.settings.quiet {
            println!("{line}");
        }
    }

    /// Only shown with `--verbose`.
    pub fn detail(&self, message: &str) {
        if self.settings.verbose && !self.settings.quiet {
            eprintln!("{}", self.status_line(Tone::Note, message));
        }
    }

    pub fn heading(&self, title: &str) {
        if !self.settings.quiet {
            println!("{}", Tone::Heading.paint(title, self.settings.color));
        }
    }

    fn status_line(&self, tone: Tone, message: &str) -> String {
        let color = self.settings.color;
        format!("{} {}", tone.paint(tone.marker(), color), tone.paint(message, color))
    }
}
