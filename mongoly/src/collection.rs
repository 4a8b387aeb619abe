//! Hand-off between the metadata engine and whatever applies it to a live database.
//!
//! The engine never connects anywhere. A [`CollectionPlan`] bundles the artifacts for
//! one collection and [`ApplyCollection`] is the seam a database client implements to
//! install the validator and build the indexes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::indexes::IndexSpec;
use crate::schema::SchemaNode;

/// How a document name becomes a collection name when none is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionNaming {
    /// `CatOwner` -> `cat_owners`
    #[default]
    SnakePlural,
    /// `CatOwner` -> `CatOwner`
    Verbatim,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    pub collection_name: Option<String>,
    pub naming: CollectionNaming,
    /// Drop indexes on the collection that are not part of the plan.
    pub drop_old_indexes: bool,
}

impl CollectionOptions {
    pub fn named(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: Some(collection_name.into()),
            ..Self::default()
        }
    }

    pub fn collection_name_for(&self, document_name: &str) -> String {
        match &self.collection_name {
            Some(name) => name.clone(),
            None => collection_name(document_name, self.naming),
        }
    }
}

/// Everything needed to prepare one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPlan {
    pub name: String,
    pub collection_name: String,
    pub schema: SchemaNode,
    pub indexes: Vec<IndexSpec>,
    pub drop_old_indexes: bool,
}

impl CollectionPlan {
    /// `{ "$jsonSchema": ... }` validator document for the collection.
    pub fn validator(&self) -> serde_json::Result<Value> {
        self.schema.to_validator()
    }

    /// Installs the validator, then the indexes.
    pub fn apply<A>(&self, target: &mut A) -> Result<(), A::Error>
    where
        A: ApplyCollection + ?Sized,
    {
        target.apply_validator(&self.collection_name, &self.schema)?;
        target.apply_indexes(&self.collection_name, &self.indexes, self.drop_old_indexes)
    }
}

/// Implemented by the database collaborator that performs the actual I/O.
pub trait ApplyCollection {
    type Error;

    /// Creates the collection or updates its validator.
    fn apply_validator(&mut self, collection: &str, schema: &SchemaNode) -> Result<(), Self::Error>;

    /// Builds `indexes`, optionally dropping indexes not in the list first.
    fn apply_indexes(&mut self, collection: &str, indexes: &[IndexSpec], drop_old: bool) -> Result<(), Self::Error>;
}

pub fn collection_name(document_name: &str, naming: CollectionNaming) -> String {
    match naming {
        CollectionNaming::SnakePlural => pluralize(&to_snake_case(document_name)),
        CollectionNaming::Verbatim => document_name.to_string(),
    }
}

/// Converts a PascalCase identifier to snake_case, keeping acronyms together.
fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Simple pluralization rules
fn pluralize(word: &str) -> String {
    let vowel_y = ["ay", "ey", "oy", "uy"].iter().any(|suffix| word.ends_with(suffix));
    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        format!("{}es", word)
    } else if word.ends_with('y') && !vowel_y {
        format!("{}ies", &word[..word.len() - 1])
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BsonType;
    use crate::types::IndexDirection;

    #[test]
    fn snake_plural_names() {
        assert_eq!(collection_name("Cat", CollectionNaming::SnakePlural), "cats");
        assert_eq!(collection_name("CatOwner", CollectionNaming::SnakePlural), "cat_owners");
        assert_eq!(collection_name("Category", CollectionNaming::SnakePlural), "categories");
        assert_eq!(collection_name("Box", CollectionNaming::SnakePlural), "boxes");
        assert_eq!(collection_name("Day", CollectionNaming::SnakePlural), "days");
        assert_eq!(collection_name("HTTPLog", CollectionNaming::SnakePlural), "http_logs");
        assert_eq!(collection_name("CatOwner", CollectionNaming::Verbatim), "CatOwner");
    }

    #[test]
    fn explicit_collection_name_wins() {
        let options = CollectionOptions::named("felines");
        assert_eq!(options.collection_name_for("Cat"), "felines");
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl ApplyCollection for Recorder {
        type Error = String;

        fn apply_validator(&mut self, collection: &str, schema: &SchemaNode) -> Result<(), Self::Error> {
            self.calls.push(format!("validator:{collection}:{}", schema.properties.len()));
            Ok(())
        }

        fn apply_indexes(&mut self, collection: &str, indexes: &[IndexSpec], drop_old: bool) -> Result<(), Self::Error> {
            self.calls.push(format!("indexes:{collection}:{}:{drop_old}", indexes.len()));
            Ok(())
        }
    }

    #[test]
    fn apply_installs_validator_before_indexes() {
        let mut schema = SchemaNode::object();
        schema.properties.insert("name".into(), SchemaNode::typed(BsonType::String));
        let plan = CollectionPlan {
            name: "Cat".into(),
            collection_name: "cats".into(),
            schema,
            indexes: vec![IndexSpec::new("name", IndexDirection::Ascending)],
            drop_old_indexes: true,
        };

        let mut recorder = Recorder::default();
        plan.apply(&mut recorder).unwrap();
        assert_eq!(recorder.calls, ["validator:cats:1", "indexes:cats:1:true"]);
    }
}
