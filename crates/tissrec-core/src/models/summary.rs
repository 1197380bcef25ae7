//! Record types produced by document extraction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of TISS document.
///
/// Exactly one kind per document; guides inherit it. Appeal guides are
/// sub-records of the document's single appeal block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    /// Glosa appeal (recurso de glosa).
    Appeal,
    /// Outpatient consultation batch.
    Consultation,
    /// SP-SADT procedure batch.
    Sadt,
    /// None of the known guide markers present.
    Unknown,
}

impl Default for DocumentKind {
    fn default() -> Self {
        Self::Unknown
    }
}

impl DocumentKind {
    /// Stable label used in composite keys and tabular output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Appeal => "APPEAL",
            DocumentKind::Consultation => "CONSULTATION",
            DocumentKind::Sadt => "SADT",
            DocumentKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One summary row per processed document.
///
/// Immutable once produced. A failed parse still occupies its slot in the
/// batch, with `error` set and the numeric fields zeroed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Source file name.
    pub file_name: String,

    /// Lot number declared inside the XML (empty when parsing failed).
    pub lot_number: String,

    /// Document kind.
    pub kind: DocumentKind,

    /// Number of guides in the document.
    pub guide_count: usize,

    /// Monetary total across all guides.
    pub total: Decimal,

    /// Which fallback strategy produced the total.
    pub strategy: String,

    /// Appeal protocol number, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Parse failure description; `None` on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SummaryRecord {
    /// Error-marker record for a document that failed to parse.
    pub fn failed(file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            lot_number: String::new(),
            kind: DocumentKind::Unknown,
            guide_count: 0,
            total: Decimal::ZERO,
            strategy: "error".to_string(),
            protocol: None,
            error: Some(error.into()),
        }
    }

    /// Guides present but no money extracted: the source data needs a look.
    pub fn is_suspect(&self) -> bool {
        self.guide_count > 0 && self.total.is_zero()
    }
}

/// One row per guide for the audit view.
///
/// Each variant carries only the fields that exist for its guide kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuideAudit {
    Consultation {
        file_name: String,
        /// Document lot number; empty when the document declared none.
        lot_number: String,
        /// numeroGuiaPrestador.
        provider_guide: String,
        service_date: Option<NaiveDate>,
        /// numeroCarteira of the beneficiary.
        patient_card: String,
        /// codigoPrestadorNaOperadora.
        provider_code: String,
        /// valorProcedimento of the consultation.
        total: Decimal,
    },
    Sadt {
        file_name: String,
        lot_number: String,
        /// numeroGuiaPrestador from the guide header.
        provider_guide: String,
        service_date: Option<NaiveDate>,
        patient_card: String,
        provider_code: String,
        /// valorTotalGeral as declared (zero when absent).
        declared_total: Decimal,
        /// Sum over executed procedure items.
        procedure_items: Decimal,
        /// Sum over other-expense items.
        other_expense_items: Decimal,
        /// procedure_items + other_expense_items.
        itemized_total: Decimal,
    },
    Appeal {
        file_name: String,
        lot_number: String,
        /// numeroProtocolo of the appeal block.
        protocol: String,
        /// numeroGuiaOrigem of the contested guide.
        origin_guide: String,
        /// numeroGuiaOperadora assigned by the payer.
        operator_guide: String,
        appeal_date: Option<NaiveDate>,
        patient_card: String,
        provider_code: String,
    },
}

impl GuideAudit {
    /// Key identifying the same guide across files, used for duplicate
    /// detection: provider guide number, or for appeals the origin guide
    /// number falling back to the operator's.
    pub fn identity_key(&self) -> Option<&str> {
        let key = match self {
            GuideAudit::Consultation { provider_guide, .. } => provider_guide.as_str(),
            GuideAudit::Sadt { provider_guide, .. } => provider_guide.as_str(),
            GuideAudit::Appeal {
                origin_guide,
                operator_guide,
                ..
            } => {
                if origin_guide.is_empty() {
                    operator_guide.as_str()
                } else {
                    origin_guide.as_str()
                }
            }
        };
        (!key.is_empty()).then_some(key)
    }

    /// Source file the guide was read from.
    pub fn file_name(&self) -> &str {
        match self {
            GuideAudit::Consultation { file_name, .. }
            | GuideAudit::Sadt { file_name, .. }
            | GuideAudit::Appeal { file_name, .. } => file_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspect_flag() {
        let mut record = SummaryRecord::failed("a.xml", "boom");
        assert!(!record.is_suspect());

        record.error = None;
        record.guide_count = 3;
        assert!(record.is_suspect());

        record.total = Decimal::new(100, 2);
        assert!(!record.is_suspect());
    }

    #[test]
    fn appeal_identity_falls_back_to_operator_guide() {
        let guide = GuideAudit::Appeal {
            file_name: "r.xml".into(),
            lot_number: "1".into(),
            protocol: String::new(),
            origin_guide: String::new(),
            operator_guide: "OP-9".into(),
            appeal_date: None,
            patient_card: String::new(),
            provider_code: String::new(),
        };
        assert_eq!(guide.identity_key(), Some("OP-9"));
    }
}
