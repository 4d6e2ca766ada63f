//! Scanner record types
//!
//! Defines the typed records recovered from stored XML fragments and
//! returned through the HTTP API.

use serde::{Deserialize, Serialize};

/// A single scanner record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    /// A completed barcode reading
    Barcode { value: String },
    /// An annotation recovered from stored XML
    Annotation(AnnotationRecord),
}

impl Record {
    /// Construct a barcode record from a completed framer emission
    pub fn barcode(value: impl Into<String>) -> Self {
        Self::Barcode {
            value: value.into(),
        }
    }
}

/// Annotation payload parsed back from stored XML.
///
/// Field names match the XML attribute names. Every field defaults to an
/// empty string when the attribute is absent; `value` carries the
/// element's text content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub displaytime: String,
    #[serde(default)]
    pub displaytimemilitary: String,
    #[serde(default)]
    pub displaydate: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub labeltitle: String,
    #[serde(default)]
    pub labeldata: String,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub value: String,
}
