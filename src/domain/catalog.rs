//! Catalog records and immutable catalog snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Where a catalogued agent comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentSource {
    #[serde(rename = "Open Source")]
    OpenSource,
    #[serde(rename = "N8N")]
    N8n,
    #[serde(rename = "Make.com")]
    MakeCom,
    Internal,
}

/// Output format produced by an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    Csv,
    Json,
    Pdf,
}

/// One registered agent.
///
/// Only `name`, `description`, `skills` and `technologies` take part in
/// matching. The remaining fields are display data carried through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    pub source: AgentSource,
    pub author: String,
    pub version: String,
    pub output_format: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl CatalogRecord {
    /// Technologies, or an empty slice when the record has none.
    pub fn technologies(&self) -> &[String] {
        self.technologies.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    #[error("record {id} has an empty {field}")]
    EmptyField { id: String, field: &'static str },

    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse YAML catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// An ordered, validated, immutable set of records.
///
/// Cloning is cheap. Adding a record produces a new snapshot and leaves
/// every existing clone untouched, so a match in flight never observes a
/// catalog change.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Arc<[CatalogRecord]>,
}

impl Catalog {
    pub fn new(records: Vec<CatalogRecord>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.id.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    id: record.id.clone(),
                    field: "id",
                });
            }
            if record.name.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    id: record.id.clone(),
                    field: "name",
                });
            }
            if record.description.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    id: record.id.clone(),
                    field: "description",
                });
            }
            if !seen.insert(record.id.as_str()) {
                return Err(CatalogError::DuplicateId(record.id.clone()));
            }
        }

        Ok(Self {
            records: records.into(),
        })
    }

    /// Loads a catalog from a JSON or YAML file (chosen by extension).
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;

        let records: Vec<CatalogRecord> = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        Self::new(records)
    }

    /// Returns a new snapshot with `record` appended.
    pub fn with_record(&self, record: CatalogRecord) -> Result<Self, CatalogError> {
        let mut records = self.records.to_vec();
        records.push(record);
        Self::new(records)
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&CatalogRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
