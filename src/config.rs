// src/config.rs

use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::{fs, path::Path};

/// Everything the ingestion engine can be tuned with. Every field has a
/// default, so an empty TOML file is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub layout: LayoutProfile,
    /// Unit-of-measure tokens that anchor the quantity column.
    pub units: Vec<String>,
    /// Markers identifying a duplicate copy of a delivery note.
    pub stop_markers: Vec<String>,
    pub min_code_len: usize,
    pub header_scan_rows: usize,
    /// Case-insensitive fragment of the worksheet holding the item table.
    pub sheet_name_hint: String,
}

/// Geometry used to rebuild text lines from positioned runs.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LayoutProfile {
    /// Baselines closer than this are the same printed line.
    pub line_tolerance: f64,
    /// Horizontal units rendered as one space.
    pub units_per_space: f64,
}

impl Default for LayoutProfile {
    fn default() -> Self {
        Self {
            line_tolerance: 5.0,
            units_per_space: 5.5,
        }
    }
}

fn default_units() -> Vec<String> {
    [
        "UN", "UNI", "UNID", "KG", "KGS", "GR", "LT", "LTS", "MT", "MTS", "M", "M2", "M3", "CX",
        "CJ", "PAQ", "PAR", "ROL", "BOL", "BLS", "JGO", "PZA", "PZ", "DOC",
    ]
    .iter()
    .map(|u| u.to_string())
    .collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            layout: LayoutProfile::default(),
            units: default_units(),
            stop_markers: vec!["DUPLICADO".to_string(), "TRIPLICADO".to_string()],
            min_code_len: 4,
            header_scan_rows: 10,
            sheet_name_hint: "inventario".to_string(),
        }
    }
}

impl IngestConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| IngestError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.layout.line_tolerance > 0.0) {
            return Err(IngestError::Config(
                "layout.line_tolerance must be positive".into(),
            ));
        }
        if !(self.layout.units_per_space > 0.0) {
            return Err(IngestError::Config(
                "layout.units_per_space must be positive".into(),
            ));
        }
        if self.units.iter().all(|u| u.trim().is_empty()) {
            return Err(IngestError::Config("units must not be empty".into()));
        }
        if self.min_code_len == 0 {
            return Err(IngestError::Config("min_code_len must be at least 1".into()));
        }
        Ok(())
    }
}
