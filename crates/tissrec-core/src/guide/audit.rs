//! Per-guide audit rows.
//!
//! One row per guide with the identifying fields an operator needs to
//! cross-check a document against the payer's records. Unlike summary
//! extraction, auditing tolerates a missing lot number.

use chrono::NaiveDate;

use super::extract::{consultation_value, lot_number};
use super::totals::{declared_grand_total, other_expense_items, procedure_items};
use super::{appeal_guide, classify};
use crate::error::Result;
use crate::models::summary::{DocumentKind, GuideAudit};
use crate::num::parse_decimal;
use crate::xml::{self, Element};

/// Audit a document from raw bytes.
pub fn audit_bytes(bytes: &[u8], file_name: &str) -> Result<Vec<GuideAudit>> {
    let root = xml::parse(bytes)?;
    audit_document(&root, file_name)
}

/// One audit row per guide of a parsed document.
pub fn audit_document(root: &Element, file_name: &str) -> Result<Vec<GuideAudit>> {
    let lot = lot_number(root).map(str::to_string).unwrap_or_default();

    match classify(root) {
        DocumentKind::Appeal => audit_appeal(root, file_name, &lot),
        DocumentKind::Consultation => audit_consultation(root, file_name, &lot),
        // Unknown documents yield no rows from the SADT walk.
        DocumentKind::Sadt | DocumentKind::Unknown => audit_sadt(root, file_name, &lot),
    }
}

fn audit_appeal(root: &Element, file_name: &str, doc_lot: &str) -> Result<Vec<GuideAudit>> {
    let Some(guide) = appeal_guide(root) else {
        return Ok(Vec::new());
    };
    let protocol = guide.child_text("numeroProtocolo").to_string();
    let block_lot = guide.child_text("numeroLote");
    let lot = if block_lot.is_empty() { doc_lot } else { block_lot };

    let mut rows = Vec::new();
    for option in guide.children().filter(|c| c.name() == "opcaoRecurso") {
        for entry in option.children().filter(|c| c.name() == "recursoGuia") {
            rows.push(GuideAudit::Appeal {
                file_name: file_name.to_string(),
                lot_number: lot.to_string(),
                protocol: protocol.clone(),
                origin_guide: entry.find_text("numeroGuiaOrigem").to_string(),
                operator_guide: entry.find_text("numeroGuiaOperadora").to_string(),
                appeal_date: parse_date(entry.find_text("dataRecurso")),
                patient_card: entry.find_text("numeroCarteira").to_string(),
                provider_code: entry.find_text("codigoPrestadorNaOperadora").to_string(),
            });
        }
    }
    Ok(rows)
}

fn audit_consultation(root: &Element, file_name: &str, lot: &str) -> Result<Vec<GuideAudit>> {
    let mut rows = Vec::new();
    for guide in root.find_all("guiaConsulta") {
        rows.push(GuideAudit::Consultation {
            file_name: file_name.to_string(),
            lot_number: lot.to_string(),
            provider_guide: guide.find_text("numeroGuiaPrestador").to_string(),
            service_date: parse_date(guide.find_text("dataAtendimento")),
            patient_card: guide.find_text("numeroCarteira").to_string(),
            provider_code: guide.find_text("codigoPrestadorNaOperadora").to_string(),
            total: parse_decimal(consultation_value(guide))?,
        });
    }
    Ok(rows)
}

fn audit_sadt(root: &Element, file_name: &str, lot: &str) -> Result<Vec<GuideAudit>> {
    let mut rows = Vec::new();
    for guide in root.find_all("guiaSP-SADT") {
        let provider_guide = guide
            .find("cabecalhoGuia")
            .map(|header| header.child_text("numeroGuiaPrestador"))
            .unwrap_or("");
        let procedures = procedure_items(guide)?;
        let other_expenses = other_expense_items(guide)?;
        rows.push(GuideAudit::Sadt {
            file_name: file_name.to_string(),
            lot_number: lot.to_string(),
            provider_guide: provider_guide.to_string(),
            service_date: parse_date(guide.find_text("dataAtendimento")),
            patient_card: guide.find_text("numeroCarteira").to_string(),
            provider_code: guide.find_text("codigoPrestadorNaOperadora").to_string(),
            declared_total: declared_grand_total(guide)?,
            procedure_items: procedures,
            other_expense_items: other_expenses,
            itemized_total: procedures + other_expenses,
        });
    }
    Ok(rows)
}

/// TISS dates are ISO yyyy-mm-dd; anything else reads as absent.
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}
