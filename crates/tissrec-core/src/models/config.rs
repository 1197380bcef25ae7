//! Configuration for demonstrative ingestion and reconciliation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main configuration for the tissrec pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TissConfig {
    /// Demonstrative spreadsheet contract.
    pub demonstrative: DemonstrativeConfig,

    /// Reconciliation thresholds.
    pub reconciliation: ReconciliationConfig,
}

impl Default for TissConfig {
    fn default() -> Self {
        Self {
            demonstrative: DemonstrativeConfig::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }
}

/// Where to find the statement rows inside a demonstrative workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemonstrativeConfig {
    /// Sheet holding the per-account analysis rows.
    pub sheet_name: String,

    /// Literal first-column value anchoring the header row.
    pub header_anchor: String,
}

impl Default for DemonstrativeConfig {
    fn default() -> Self {
        Self {
            sheet_name: "DemonstrativoAnaliseDeContas".to_string(),
            header_anchor: "CPF/CNPJ".to_string(),
        }
    }
}

/// Reconciliation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Absolute tolerance for the conference flags, in currency units.
    /// Covers bookkeeping rounding, not percentage error.
    pub tolerance: Decimal,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 2),
        }
    }
}

impl TissConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
