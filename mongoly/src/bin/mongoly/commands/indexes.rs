use std::path::Path;

use anyhow::Result;
use clap::Args;
use indexmap::IndexMap;
use mongoly::IndexSpec;
use serde::Serialize;

use super::selected_documents;
use crate::context::ProjectContext;
use crate::output::{Report, Reporter};

pub const USAGE: &[&str] = &[
    "mongoly indexes                     # Indexes of every document",
    "mongoly indexes --document Owner    # Including nested paths such as address.city",
];

#[derive(Args)]
pub struct IndexesArgs {
    /// Only show this document
    #[arg(long)]
    pub document: Option<String>,
}

/// Derived indexes keyed by collection name.
#[derive(Serialize)]
#[serde(transparent)]
pub struct IndexReport {
    pub collections: IndexMap<String, Vec<IndexSpec>>,
}

fn flag(set: bool) -> String {
    if set { "yes".into() } else { String::new() }
}

impl Report for IndexReport {
    fn columns(&self) -> &'static [&'static str] {
        &["Collection", "Key", "Kind", "Unique", "Sparse", "TTL", "Name"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.collections
            .iter()
            .flat_map(|(collection, indexes)| {
                indexes.iter().map(move |index| {
                    vec![
                        collection.clone(),
                        index.path().to_string(),
                        index.direction().to_string(),
                        flag(index.unique),
                        flag(index.sparse),
                        index
                            .expire_after_seconds
                            .map(|seconds| format!("{seconds}s"))
                            .unwrap_or_default(),
                        index.name.clone().unwrap_or_default(),
                    ]
                })
            })
            .collect()
    }

    fn compact(&self) -> String {
        self.collections
            .iter()
            .map(|(collection, indexes)| {
                let keys: Vec<String> = indexes
                    .iter()
                    .map(|index| format!("{}:{}", index.path(), index.direction()))
                    .collect();
                format!("{collection}: {}", keys.join(" "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn handle_indexes(args: IndexesArgs, manifest: Option<&Path>, reporter: &Reporter) -> Result<()> {
    let ctx = ProjectContext::find()?;
    let mut loaded = ctx.load_manifest(manifest)?;

    let mut collections = IndexMap::new();
    for name in selected_documents(&loaded, args.document.as_deref())? {
        let document = &loaded.documents[&name];
        let (class, collection) = (document.class, document.options.collection_name_for(&name));
        let indexes = loaded.catalog.derive_indexes(class)?;
        if indexes.is_empty() {
            reporter.detail(&format!("{name} declares no indexes"));
        }
        collections.insert(collection, indexes);
    }

    reporter.report(&IndexReport { collections })
}
