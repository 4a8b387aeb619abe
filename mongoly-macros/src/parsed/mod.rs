mod document;
mod enumeration;
mod field;

pub(crate) use document::ParsedDocument;
pub(crate) use enumeration::ParsedEnumeration;
