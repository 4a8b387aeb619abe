use std::fs;

use mongoly::{CollectionNaming, CollectionOptions, Manifest, ManifestError, MetadataError};
use pretty_assertions::assert_eq;
use serde_json::json;

const LIBRARY: &str = r#"
[[document]]
name = "Shelf"

[[document.field]]
name = "label"
type = "String"
index = { direction = "text" }

[[document.field]]
name = "room"
type = "String"
index = true
exclude_from_parent_index = true

[[document]]
name = "Book"
collection = "catalogue"
drop_old_indexes = true
rename = { isbn = "_id" }

[[document.field]]
name = "isbn"
type = "String"
required = true
pattern = "^[0-9-]{10,17}$"

[[document.field]]
name = "pages"
type = "u32"
minimum = 1

[[document.field]]
name = "shelf"
type = "Shelf"
nullable = true

[[document.field]]
name = "archived_at"
type = "DateTime"
index = { expire_after_seconds = 86400, sparse = true, name = "archive_ttl" }
"#;

#[test]
fn toml_manifest_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("documents.toml");
    fs::write(&path, LIBRARY).unwrap();

    let manifest = Manifest::load(&path).unwrap();
    let mut loaded = manifest.build(&CollectionOptions::default()).unwrap();
    let plan = loaded.plan("Book").unwrap().unwrap();

    assert_eq!(plan.collection_name, "catalogue");
    assert!(plan.drop_old_indexes);
    assert_eq!(
        serde_json::to_value(&plan.schema).unwrap(),
        json!({
            "bsonType": "object",
            "properties": {
                "_id": { "bsonType": "string", "pattern": "^[0-9-]{10,17}$" },
                "pages": { "bsonType": "number", "minimum": 1.0 },
                "shelf": {
                    "bsonType": ["object", "null"],
                    "properties": {
                        "label": { "bsonType": "string" },
                        "room": { "bsonType": "string" }
                    }
                },
                "archived_at": { "bsonType": "date" }
            },
            "required": ["_id"]
        })
    );
    assert_eq!(
        serde_json::to_value(&plan.indexes).unwrap(),
        json!([
            { "key": { "shelf.label": "text" } },
            {
                "key": { "archived_at": 1 },
                "name": "archive_ttl",
                "sparse": true,
                "expireAfterSeconds": 86400
            }
        ])
    );

    let shelves = loaded.plan("Shelf").unwrap().unwrap();
    assert_eq!(shelves.collection_name, "shelves");
    assert_eq!(shelves.indexes.len(), 2);
}

#[test]
fn json_manifests_are_chosen_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("documents.json");
    let source = json!({
        "document": [{
            "name": "AuditLog",
            "field": [
                { "name": "action", "type": "String", "enum": ["create", "delete"], "required": true },
                { "name": "at", "type": "DateTime", "index": "desc" }
            ]
        }]
    });
    fs::write(&path, source.to_string()).unwrap();

    let defaults = CollectionOptions {
        naming: CollectionNaming::Verbatim,
        ..CollectionOptions::default()
    };
    let mut loaded = Manifest::load(&path).unwrap().build(&defaults).unwrap();
    let plans = loaded.plans().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].collection_name, "AuditLog");
    assert_eq!(
        serde_json::to_value(&plans[0].indexes).unwrap(),
        json!([{ "key": { "at": -1 } }])
    );
}

#[test]
fn load_reports_io_and_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = Manifest::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ManifestError::Io(_)));

    let path = dir.path().join("broken.toml");
    fs::write(&path, "[[document]]\nname = ").unwrap();
    assert!(matches!(Manifest::load(&path).unwrap_err(), ManifestError::Toml(_)));

    let path = dir.path().join("unknown.toml");
    fs::write(&path, "[[document]]\nname = \"A\"\ncolour = \"red\"\n").unwrap();
    assert!(matches!(Manifest::load(&path).unwrap_err(), ManifestError::Toml(_)));
}

#[test]
fn unknown_bson_overrides_are_metadata_errors() {
    let source = r#"
[[document]]
name = "A"

[[document.field]]
name = "x"
bson_type = "varchar"
"#;
    let err = Manifest::from_toml_str(source)
        .unwrap()
        .build(&CollectionOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ManifestError::Metadata(MetadataError::UnsupportedType { type_name }) if type_name == "varchar"
    ));
}

#[test]
fn required_nullable_fields_are_rejected() {
    let source = r#"
[[document]]
name = "A"

[[document.field]]
name = "x"
type = "String"
required = true
nullable = true
"#;
    let err = Manifest::from_toml_str(source)
        .unwrap()
        .build(&CollectionOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ManifestError::Metadata(MetadataError::RequiredAndNullable { field }) if field == "x"
    ));
}
