//! Core library for TISS claim auditing.
//!
//! This crate provides:
//! - TISS XML extraction (consultation, SP-SADT, glosa appeal)
//! - Per-guide monetary totals with kind-specific fallback chains
//! - Payment demonstrative (.xlsx) aggregation with an accumulating bank
//! - Settlement reconciliation between extracted lots and the statement
//! - Per-guide auditing and duplicate-guide removal

pub mod demonstrative;
pub mod error;
pub mod guide;
pub mod lot;
pub mod models;
pub mod num;
pub mod recon;
pub mod xml;

pub use demonstrative::{
    read_statement, read_statement_file, DemonstrativeBank, DemonstrativeEntry, LotTotals,
    Statement,
};
pub use error::{DemonstrativeError, ExtractionError, Result, TissError, XmlError};
pub use guide::{
    audit_bytes, audit_document, classify, find_duplicates, parse_document, parse_many,
    remove_guides, sadt_guide_total, summarize, TotalStrategy,
};
pub use lot::{lot_from_filename, normalize_lot};
pub use models::config::{DemonstrativeConfig, ReconciliationConfig, TissConfig};
pub use models::summary::{DocumentKind, GuideAudit, SummaryRecord};
pub use num::parse_decimal;
pub use recon::{choose_lot, composite_key, reconcile, ReconciliationRecord, KEY_SEPARATOR};
