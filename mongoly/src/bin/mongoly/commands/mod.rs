pub mod check;
pub mod indexes;
pub mod plan;
pub mod schema;

use anyhow::Result;
use mongoly::LoadedManifest;

/// Document names to report on, in manifest order.
pub fn selected_documents(loaded: &LoadedManifest, document: Option<&str>) -> Result<Vec<String>> {
    match document {
        Some(name) if loaded.documents.contains_key(name) => Ok(vec![name.to_string()]),
        Some(name) => anyhow::bail!("Unknown document `{name}`"),
        None => Ok(loaded.documents.keys().cloned().collect()),
    }
}
