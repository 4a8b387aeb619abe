use std::path::Path;

use anyhow::Result;
use mongoly::CollectionPlan;
use serde::Serialize;

use crate::context::ProjectContext;
use crate::output::{Report, Reporter};

pub const USAGE: &[&str] = &[
    "mongoly plan                        # One row per collection",
    "mongoly --output json plan          # Validators and indexes ready to apply",
];

#[derive(Serialize)]
#[serde(transparent)]
pub struct PlanReport {
    pub plans: Vec<CollectionPlan>,
}

impl Report for PlanReport {
    fn columns(&self) -> &'static [&'static str] {
        &["Document", "Collection", "Properties", "Required", "Indexes", "Drop Old"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.plans
            .iter()
            .map(|plan| {
                vec![
                    plan.name.clone(),
                    plan.collection_name.clone(),
                    plan.schema.properties.len().to_string(),
                    plan.schema.required.len().to_string(),
                    plan.indexes.len().to_string(),
                    String::from(if plan.drop_old_indexes { "yes" } else { "no" }),
                ]
            })
            .collect()
    }

    fn compact(&self) -> String {
        self.plans
            .iter()
            .map(|plan| {
                format!(
                    "{} -> {} ({} properties, {} indexes)",
                    plan.name,
                    plan.collection_name,
                    plan.schema.properties.len(),
                    plan.indexes.len()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn handle_plan(manifest: Option<&Path>, reporter: &Reporter) -> Result<()> {
    let ctx = ProjectContext::find()?;
    let mut loaded = ctx.load_manifest(manifest)?;
    let plans = loaded.plans()?;
    reporter.report(&PlanReport { plans })
}
