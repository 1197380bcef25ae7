//! Error types for the tissrec-core library.

use thiserror::Error;

/// Main error type for the tissrec library.
#[derive(Error, Debug)]
pub enum TissError {
    /// XML reading error.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// Billing-fact extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Payment demonstrative error.
    #[error("demonstrative error: {0}")]
    Demonstrative(#[from] DemonstrativeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to reading TISS XML documents.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The byte stream is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// The document contains no root element.
    #[error("document has no root element")]
    NoRoot,
}

/// Errors related to extracting billing facts from a document.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Every valid document declares a batch lot number.
    #[error("numeroLote not found in document")]
    MissingLot,

    /// A monetary or quantity field held unreadable text.
    #[error("unreadable numeric value {0:?}")]
    Number(String),
}

/// Errors related to the payment demonstrative spreadsheet.
///
/// These are fatal to the statement-ingestion call: they indicate a
/// structurally incompatible file, not a data quality issue.
#[derive(Error, Debug)]
pub enum DemonstrativeError {
    /// The workbook could not be opened or read.
    #[error("failed to open workbook: {0}")]
    Workbook(String),

    /// The expected sheet is missing.
    #[error("sheet {0:?} not found in workbook")]
    SheetNotFound(String),

    /// No row of the sheet starts with the header anchor.
    #[error("header row {0:?} not found in first column")]
    HeaderNotFound(String),

    /// Required columns are absent from the header row.
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Result type for the tissrec library.
pub type Result<T> = std::result::Result<T, TissError>;
