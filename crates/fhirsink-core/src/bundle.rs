use serde::Deserialize;
use serde_json::Value;

/// One ingestion unit: a document grouping resource entries under `entry`.
///
/// Only the shape needed for extraction is modeled; everything else in the
/// bundle document is ignored. The per-entry `resource` is kept as raw JSON
/// because it is both the extraction input and the verbatim payload that
/// ends up in the store.
#[derive(Debug, Clone, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleEntry {
    #[serde(default)]
    pub resource: Value,
}
