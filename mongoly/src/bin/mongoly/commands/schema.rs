use std::path::Path;

use anyhow::Result;
use clap::Args;
use indexmap::IndexMap;
use mongoly::SchemaNode;
use serde::Serialize;
use serde_json::Value;

use super::selected_documents;
use crate::context::ProjectContext;
use crate::output::{Report, Reporter};
use crate::theme::Tone;

pub const USAGE: &[&str] = &[
    "mongoly schema                      # Properties of every document",
    "mongoly schema --document Cat       # Properties of one document",
    "mongoly --output json schema        # $jsonSchema validator documents",
];

#[derive(Args)]
pub struct SchemaArgs {
    /// Only show this document
    #[arg(long)]
    pub document: Option<String>,
}

/// Synthesized schemas keyed by document name.
#[derive(Serialize)]
#[serde(transparent)]
pub struct SchemaReport {
    pub validators: IndexMap<String, Value>,
    #[serde(skip)]
    schemas: IndexMap<String, SchemaNode>,
}

impl SchemaReport {
    pub fn new(schemas: IndexMap<String, SchemaNode>) -> Result<Self> {
        let mut validators = IndexMap::new();
        for (name, schema) in &schemas {
            validators.insert(name.clone(), schema.to_validator()?);
        }
        Ok(Self { validators, schemas })
    }
}

impl Report for SchemaReport {
    fn columns(&self) -> &'static [&'static str] {
        &["Document", "Property", "Type", "Required", "Constraints"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        for (name, schema) in &self.schemas {
            for (property, node) in &schema.properties {
                let required = schema.required.iter().any(|entry| entry == property);
                rows.push(vec![
                    name.clone(),
                    property.clone(),
                    describe_type(node),
                    if required { "yes".into() } else { String::new() },
                    constraints(node),
                ]);
            }
        }
        rows
    }

    fn compact(&self) -> String {
        self.schemas
            .iter()
            .map(|(name, schema)| {
                let properties: Vec<&str> = schema.properties.keys().map(String::as_str).collect();
                format!("{name}: {}", properties.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn describe_type(node: &SchemaNode) -> String {
    if let Some(values) = &node.enum_values {
        return format!("enum {}", Value::Array(values.clone()));
    }
    let base = match &node.bson_type {
        Some(ty) => serde_json::to_value(ty).map(|value| compact_json(&value)).unwrap_or_default(),
        None => String::new(),
    };
    match &node.items {
        Some(items) => format!("{base} of {}", describe_type(items)),
        None => base,
    }
}

/// Every keyword besides the type, properties and required list, as compact JSON.
fn constraints(node: &SchemaNode) -> String {
    let Ok(Value::Object(mut map)) = serde_json::to_value(node) else {
        return String::new();
    };
    for key in ["bsonType", "enum", "properties", "required", "items"] {
        map.remove(key);
    }
    map.iter()
        .map(|(key, value)| format!("{key}={}", compact_json(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn compact_json(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn handle_schema(args: SchemaArgs, manifest: Option<&Path>, reporter: &Reporter) -> Result<()> {
    let ctx = ProjectContext::find()?;
    let mut loaded = ctx.load_manifest(manifest)?;

    let mut schemas = IndexMap::new();
    for name in selected_documents(&loaded, args.document.as_deref())? {
        let class = loaded.documents[&name].class;
        let schema = loaded.catalog.synthesize(class)?;
        schemas.insert(name, schema);
    }

    if schemas.is_empty() {
        reporter.status(Tone::Warned, "No documents declared in the manifest.");
        return Ok(());
    }
    reporter.detail(&format!("{} schema builds", loaded.catalog.stats().schema_builds));
    reporter.report(&SchemaReport::new(schemas)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongoly::BsonType;

    fn report() -> SchemaReport {
        let mut cat = SchemaNode::object();
        let mut age = SchemaNode::typed(BsonType::Number);
        age.minimum = Some(0.0);
        cat.properties.insert("name".into(), SchemaNode::typed(BsonType::String));
        cat.properties.insert("age".into(), age);
        cat.required.push("name".into());
        let mut schemas = IndexMap::new();
        schemas.insert("Cat".to_string(), cat);
        SchemaReport::new(schemas).unwrap()
    }

    #[test]
    fn json_output_is_the_validator_map() {
        let report = report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["Cat"]["$jsonSchema"]["required"], serde_json::json!(["name"]));
    }

    #[test]
    fn rows_list_properties_with_constraints() {
        let rows = report().rows();
        assert_eq!(rows[0], ["Cat", "name", "string", "yes", ""]);
        assert_eq!(rows[1], ["Cat", "age", "number", "", "minimum=0.0"]);
        assert_eq!(report().compact(), "Cat: name, age");
    }
}
