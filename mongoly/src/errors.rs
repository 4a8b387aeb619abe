use thiserror::Error;

/// Configuration errors raised while describing or synthesizing document metadata.
///
/// All of these point at a defect in the annotated definitions rather than a runtime
/// condition; none are retried or recovered internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// A type reference did not name one of the recognised primitive types.
    #[error("unsupported data type `{type_name}`")]
    UnsupportedType { type_name: String },

    /// An array type literal listed more (or fewer) than one element type.
    #[error("field `{field}` declares {count} array element types, expected exactly one")]
    AmbiguousArrayType { field: String, count: usize },

    /// A field was registered without a precomputed schema fragment.
    #[error("field `{field}` of `{class}` has no schema fragment")]
    MissingSchemaFragment { class: String, field: String },

    /// A field flagged as a class reference carries no resolvable target.
    #[error("field `{field}` of `{class}` is a class reference without a target type")]
    MissingTypeReference { class: String, field: String },

    /// Both `pick` and `omit` were configured on the same class.
    #[error("`{class}` configures both pick and omit")]
    ConflictingFieldSelection { class: String },

    /// A field was marked both required and nullable.
    #[error("field `{field}` cannot be both nullable and required")]
    RequiredAndNullable { field: String },

    /// The class id was never declared in this catalog.
    #[error("unknown class id {id}")]
    UnknownClass { id: u32 },

    /// A class appears in its own parent chain.
    #[error("`{class}` inherits from itself")]
    CircularInheritance { class: String },

    /// A nested class reference re-enters a class already being walked or defined.
    #[error("`{class}` references itself through field `{field}`")]
    CircularReference { class: String, field: String },

    /// An option value that cannot be applied (e.g. an unknown index kind).
    #[error("invalid option `{option}`: {message}")]
    InvalidOption { option: String, message: String },
}

impl MetadataError {
    /// Convenience helper for constructing an [`MetadataError::InvalidOption`].
    pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while loading a declarative document manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document `{name}` is declared more than once")]
    DuplicateDocument { name: String },

    #[error("`{document}` refers to unknown document `{name}`")]
    UnknownDocument { document: String, name: String },

    #[error("document `{name}` depends on itself")]
    CircularDocument { name: String },

    #[error("field `{field}` of `{document}`: {message}")]
    InvalidField {
        document: String,
        field: String,
        message: String,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Result alias used throughout the metadata engine.
pub type Result<T, E = MetadataError> = std::result::Result<T, E>;
