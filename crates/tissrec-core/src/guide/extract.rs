//! Per-document summary extraction.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::totals::{file_strategy_label, sadt_guide_total, TotalStrategy};
use super::{appeal_guide, batch_guides, classify};
use crate::error::{ExtractionError, Result};
use crate::models::summary::{DocumentKind, SummaryRecord};
use crate::num::parse_decimal;
use crate::xml::{self, Element};

/// Parse one TISS document from raw bytes into a summary record.
pub fn parse_document(bytes: &[u8], file_name: &str) -> Result<SummaryRecord> {
    let root = xml::parse(bytes)?;
    summarize(&root, file_name)
}

/// Parse a batch of documents.
///
/// Per-document failures never abort the batch: a failed document's slot
/// holds an error-marker record with the failure description.
pub fn parse_many<'a, I>(documents: I) -> Vec<SummaryRecord>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    documents
        .into_iter()
        .map(|(name, bytes)| {
            parse_document(bytes, name).unwrap_or_else(|e| {
                warn!("failed to parse {name}: {e}");
                SummaryRecord::failed(name, e.to_string())
            })
        })
        .collect()
}

/// Extract one summary record from a parsed document.
pub fn summarize(root: &Element, file_name: &str) -> Result<SummaryRecord> {
    let lot_number = lot_number(root)?.to_string();
    let kind = classify(root);

    let (guide_count, total, strategy, protocol) = match kind {
        DocumentKind::Appeal => sum_appeal(root)?,
        DocumentKind::Consultation => sum_consultation(root)?,
        DocumentKind::Sadt => sum_sadt(root)?,
        DocumentKind::Unknown => (0, Decimal::ZERO, TotalStrategy::Zero.as_str().to_string(), None),
    };

    debug!("{file_name}: {kind} lot {lot_number}, {guide_count} guide(s), total {total} ({strategy})");

    Ok(SummaryRecord {
        file_name: file_name.to_string(),
        lot_number,
        kind,
        guide_count,
        total,
        strategy,
        protocol,
        error: None,
    })
}

/// Lot number declared in the XML: the guide batch's, else the appeal
/// block's. Every valid document declares one.
pub(crate) fn lot_number(root: &Element) -> std::result::Result<&str, ExtractionError> {
    if let Some(batch) = root
        .find("prestadorParaOperadora")
        .and_then(|p| p.child("loteGuias"))
    {
        let lot = batch.child_text("numeroLote");
        if !lot.is_empty() {
            return Ok(lot);
        }
    }
    if let Some(guide) = appeal_guide(root) {
        let lot = guide.child_text("numeroLote");
        if !lot.is_empty() {
            return Ok(lot);
        }
    }
    Err(ExtractionError::MissingLot)
}

type KindSummary = (usize, Decimal, String, Option<String>);

/// Consultation: sum the single declared procedure value per guide.
fn sum_consultation(root: &Element) -> Result<KindSummary> {
    let guides = batch_guides(root, "guiaConsulta");
    let mut total = Decimal::ZERO;
    for guide in &guides {
        total += parse_decimal(consultation_value(guide))?;
    }
    Ok((
        guides.len(),
        total,
        TotalStrategy::ConsultationProcedureValue.as_str().to_string(),
        None,
    ))
}

/// `procedimento/valorProcedimento` text of a consultation guide.
pub(crate) fn consultation_value(guide: &Element) -> &str {
    guide
        .find_all("procedimento")
        .into_iter()
        .find_map(|p| p.child("valorProcedimento"))
        .map(Element::text)
        .unwrap_or("")
}

/// SADT: per-guide fallback chain, with a file-level strategy label.
fn sum_sadt(root: &Element) -> Result<KindSummary> {
    let guides = batch_guides(root, "guiaSP-SADT");
    if guides.is_empty() {
        return Ok((0, Decimal::ZERO, TotalStrategy::Zero.as_str().to_string(), None));
    }

    let mut total = Decimal::ZERO;
    let mut strategies: BTreeMap<TotalStrategy, usize> = BTreeMap::new();
    for guide in &guides {
        let (value, strategy) = sadt_guide_total(guide)?;
        total += value;
        *strategies.entry(strategy).or_insert(0) += 1;
    }

    Ok((guides.len(), total, file_strategy_label(&strategies), None))
}

/// Appeal: the single declared recursed amount; guides counted from the
/// appeal's option-guide list.
fn sum_appeal(root: &Element) -> Result<KindSummary> {
    let strategy = TotalStrategy::AppealRecursedAmount.as_str().to_string();
    let Some(guide) = appeal_guide(root) else {
        // Classified by transaction type alone; no block to read.
        return Ok((0, Decimal::ZERO, strategy, None));
    };

    let guide_count = guide
        .children()
        .filter(|c| c.name() == "opcaoRecurso")
        .flat_map(Element::children)
        .filter(|c| c.name() == "recursoGuia")
        .count();
    let total = parse_decimal(guide.child_text("valorTotalRecursado"))?;
    let protocol = guide.child_text("numeroProtocolo");
    let protocol = (!protocol.is_empty()).then(|| protocol.to_string());

    Ok((guide_count, total, strategy, protocol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tiss(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ans:mensagemTISS xmlns:ans="http://www.ans.gov.br/padroes/tiss/schemas">{body}</ans:mensagemTISS>"#
        )
    }

    fn consultation_doc() -> String {
        tiss(
            "<ans:prestadorParaOperadora><ans:loteGuias>
                <ans:numeroLote>4810</ans:numeroLote>
                <ans:guiasTISS>
                    <ans:guiaConsulta>
                        <ans:procedimento><ans:valorProcedimento>120,00</ans:valorProcedimento></ans:procedimento>
                    </ans:guiaConsulta>
                    <ans:guiaConsulta>
                        <ans:procedimento><ans:valorProcedimento>80.00</ans:valorProcedimento></ans:procedimento>
                    </ans:guiaConsulta>
                </ans:guiasTISS>
            </ans:loteGuias></ans:prestadorParaOperadora>",
        )
    }

    fn sadt_mixed_doc() -> String {
        tiss(
            "<ans:prestadorParaOperadora><ans:loteGuias>
                <ans:numeroLote>555</ans:numeroLote>
                <ans:guiasTISS>
                    <ans:guiaSP-SADT>
                        <ans:valorTotal><ans:valorTotalGeral>300.00</ans:valorTotalGeral></ans:valorTotal>
                    </ans:guiaSP-SADT>
                    <ans:guiaSP-SADT>
                        <ans:procedimentosExecutados><ans:procedimentoExecutado>
                            <ans:valorTotal>150.50</ans:valorTotal>
                        </ans:procedimentoExecutado></ans:procedimentosExecutados>
                    </ans:guiaSP-SADT>
                </ans:guiasTISS>
            </ans:loteGuias></ans:prestadorParaOperadora>",
        )
    }

    fn appeal_doc() -> String {
        tiss(
            "<ans:cabecalho><ans:identificacaoTransacao>
                <ans:tipoTransacao>RECURSO_GLOSA</ans:tipoTransacao>
            </ans:identificacaoTransacao></ans:cabecalho>
            <ans:prestadorParaOperadora><ans:recursoGlosa><ans:guiaRecursoGlosa>
                <ans:numeroLote>92400</ans:numeroLote>
                <ans:numeroProtocolo>PR-17</ans:numeroProtocolo>
                <ans:valorTotalRecursado>1234,56</ans:valorTotalRecursado>
                <ans:opcaoRecurso>
                    <ans:recursoGuia><ans:numeroGuiaOrigem>G1</ans:numeroGuiaOrigem></ans:recursoGuia>
                    <ans:recursoGuia><ans:numeroGuiaOrigem>G2</ans:numeroGuiaOrigem></ans:recursoGuia>
                </ans:opcaoRecurso>
            </ans:guiaRecursoGlosa></ans:recursoGlosa></ans:prestadorParaOperadora>",
        )
    }

    #[test]
    fn consultation_summary() {
        let record = parse_document(consultation_doc().as_bytes(), "lote_4810.xml").unwrap();
        assert_eq!(record.kind, DocumentKind::Consultation);
        assert_eq!(record.lot_number, "4810");
        assert_eq!(record.guide_count, 2);
        assert_eq!(record.total, Decimal::new(20000, 2));
        assert_eq!(record.strategy, "consultation-procedure-value");
        assert_eq!(record.protocol, None);
    }

    #[test]
    fn sadt_summary_reports_mixed_strategies() {
        let record = parse_document(sadt_mixed_doc().as_bytes(), "sadt.xml").unwrap();
        assert_eq!(record.kind, DocumentKind::Sadt);
        assert_eq!(record.guide_count, 2);
        assert_eq!(record.total, Decimal::new(45050, 2));
        assert_eq!(record.strategy, "mixed: declared-grand-total=1, itemized-sum=1");
    }

    #[test]
    fn appeal_summary() {
        let record = parse_document(appeal_doc().as_bytes(), "LOTE 132238 Recurso X.xml").unwrap();
        assert_eq!(record.kind, DocumentKind::Appeal);
        assert_eq!(record.lot_number, "92400");
        assert_eq!(record.guide_count, 2);
        assert_eq!(record.total, Decimal::new(123456, 2));
        assert_eq!(record.strategy, "appeal-recursed-amount");
        assert_eq!(record.protocol.as_deref(), Some("PR-17"));
    }

    #[test]
    fn missing_lot_is_fatal_for_the_document() {
        let raw = tiss(
            "<ans:prestadorParaOperadora><ans:loteGuias><ans:guiasTISS>
                <ans:guiaConsulta/>
            </ans:guiasTISS></ans:loteGuias></ans:prestadorParaOperadora>",
        );
        assert!(parse_document(raw.as_bytes(), "x.xml").is_err());
    }

    #[test]
    fn batch_keeps_failed_slots_in_order() {
        let good = consultation_doc();
        let bad = "<broken".to_string();
        let records = parse_many(vec![
            ("a.xml", good.as_bytes()),
            ("b.xml", bad.as_bytes()),
        ]);
        assert_eq!(records.len(), 2);
        assert!(records[0].error.is_none());
        assert_eq!(records[1].file_name, "b.xml");
        assert!(records[1].error.is_some());
        assert_eq!(records[1].strategy, "error");
        assert_eq!(records[1].total, Decimal::ZERO);
    }
}
