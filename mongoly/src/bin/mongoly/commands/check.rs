use std::path::Path;

use anyhow::Result;

use crate::context::ProjectContext;
use crate::output::Reporter;
use crate::theme::Tone;

pub const USAGE: &[&str] = &[
    "mongoly check                       # Synthesize every document and report errors",
    "mongoly check --manifest docs.json  # Check a specific manifest",
];

/// Builds every schema and index list, reporting each failing document.
pub fn handle_check(manifest: Option<&Path>, reporter: &Reporter) -> Result<()> {
    reporter.heading("Checking documents");

    let ctx = ProjectContext::find()?;
    let path = ctx.manifest_path(manifest);
    let mut loaded = match ctx.load_manifest(manifest) {
        Ok(loaded) => loaded,
        Err(err) => {
            reporter.status(Tone::Failed, &format!("{err:#}"));
            anyhow::bail!("{} is not a valid manifest", path.display());
        }
    };

    let mut failures = 0usize;
    let names: Vec<String> = loaded.documents.keys().cloned().collect();
    for name in &names {
        let class = loaded.documents[name].class;
        let result = loaded
            .catalog
            .synthesize(class)
            .and_then(|_| loaded.catalog.derive_indexes(class));
        match result {
            Ok(indexes) if indexes.is_empty() => reporter.status(Tone::Warned, &format!("{name}: no indexes")),
            Ok(indexes) => reporter.status(Tone::Note, &format!("{name}: {} indexes", indexes.len())),
            Err(err) => {
                failures += 1;
                reporter.status(Tone::Failed, &format!("{name}: {err}"));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} documents failed", names.len());
    }

    let stats = loaded.catalog.stats();
    reporter.detail(&format!(
        "{} schema builds, {} index walks",
        stats.schema_builds, stats.index_walks
    ));
    reporter.status(Tone::Passed, &format!("{} documents OK", names.len()));
    Ok(())
}
