//! Dataset loading and mapping output.
//!
//! Provides the `RelationshipSource`, `ProductSource` and `MappingSink`
//! traits plus plain-file implementations. The matching crates never touch
//! the filesystem; everything they consume comes through here.

use pharmabrand_model::{BrandRelationship, PharmacyItem, ProductMapping};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from dataset operations.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write mapping: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to encode mapping: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No product file configured")]
    NoProducts,
}

/// Supplies brand relationship rows.
pub trait RelationshipSource {
    fn relationships(&self) -> Result<Vec<BrandRelationship>, DatasetError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Supplies product records to match.
pub trait ProductSource {
    fn products(&self) -> Result<Vec<PharmacyItem>, DatasetError>;
}

/// Receives brand assignments.
pub trait MappingSink {
    fn write(&mut self, mapping: &ProductMapping) -> Result<(), DatasetError>;

    fn flush(&mut self) -> Result<(), DatasetError> {
        Ok(())
    }
}

/// JSON array files: a brand connections file and an optional product file.
#[derive(Debug, Clone)]
pub struct JsonDataset {
    brands_path: PathBuf,
    items_path: Option<PathBuf>,
}

impl JsonDataset {
    pub fn new(brands_path: impl Into<PathBuf>) -> Self {
        Self {
            brands_path: brands_path.into(),
            items_path: None,
        }
    }

    pub fn with_items(mut self, items_path: impl Into<PathBuf>) -> Self {
        self.items_path = Some(items_path.into());
        self
    }
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let rows: Vec<T> = serde_json::from_str(&text).map_err(|source| DatasetError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    tracing::debug!(path = %path.display(), rows = rows.len(), "Loaded JSON dataset");
    Ok(rows)
}

impl RelationshipSource for JsonDataset {
    fn relationships(&self) -> Result<Vec<BrandRelationship>, DatasetError> {
        read_json_array(&self.brands_path)
    }

    fn name(&self) -> &str {
        "json"
    }
}

impl ProductSource for JsonDataset {
    fn products(&self) -> Result<Vec<PharmacyItem>, DatasetError> {
        let path = self.items_path.as_deref().ok_or(DatasetError::NoProducts)?;
        read_json_array(path)
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MappingSink for JsonLinesSink<W> {
    fn write(&mut self, mapping: &ProductMapping) -> Result<(), DatasetError> {
        serde_json::to_writer(&mut self.writer, mapping)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DatasetError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps mappings in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub mappings: Vec<ProductMapping>,
}

impl MappingSink for MemorySink {
    fn write(&mut self, mapping: &ProductMapping) -> Result<(), DatasetError> {
        self.mappings.push(mapping.clone());
        Ok(())
    }
}
