//! Reconciliation of extracted summaries against the demonstrative bank.
//!
//! Documents group by a composite key of chosen lot and document kind, so
//! an appeal and a billing batch sharing a lot number never collide. The
//! statement side joins by lot alone, since the demonstrative has no kind
//! dimension.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::demonstrative::DemonstrativeBank;
use crate::lot::{lot_from_filename, normalize_lot};
use crate::models::config::ReconciliationConfig;
use crate::models::summary::{DocumentKind, SummaryRecord};

/// Separator between lot and kind in composite keys.
pub const KEY_SEPARATOR: &str = "__";

/// Composite reconciliation key: chosen lot joined with the kind label.
pub fn composite_key(lot: Option<&str>, kind: DocumentKind) -> String {
    format!("{}{}{}", lot.unwrap_or(""), KEY_SEPARATOR, kind.as_str())
}

/// Choose the lot to look up in the statement for one document.
///
/// Appeal file names often carry the payer's lot while the XML echoes an
/// internal routing number, so appeals prefer the filename lot. Everything
/// else trusts the XML lot first. Both sides fall back through a prefix
/// heuristic: a filename lot that is known to the statement and prefixes
/// the XML lot wins over the unknown XML lot.
pub fn choose_lot(
    kind: DocumentKind,
    xml_lot: Option<&str>,
    file_lot: Option<&str>,
    known: &HashSet<&str>,
) -> Option<String> {
    let xml = xml_lot.unwrap_or("");
    let file = file_lot.unwrap_or("");
    let is_known = |lot: &str| !lot.is_empty() && known.contains(lot);

    let chosen = if kind == DocumentKind::Appeal {
        if is_known(file) {
            file
        } else if !xml.is_empty() && xml.starts_with(file) && is_known(file) {
            file
        } else if !file.is_empty() {
            file
        } else {
            xml
        }
    } else if is_known(xml) {
        xml
    } else if !xml.is_empty() && !file.is_empty() && xml.starts_with(file) && is_known(file) {
        file
    } else if is_known(file) {
        file
    } else if !xml.is_empty() {
        xml
    } else {
        file
    };

    (!chosen.is_empty()).then(|| chosen.to_string())
}

/// One reconciliation row per composite key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    /// Composite key (`<lot>__<KIND>`).
    pub key: String,

    /// Lot chosen for the statement lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot: Option<String>,

    /// Document kind of the group.
    pub kind: DocumentKind,

    /// Statement period label(s) for the lot, when matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,

    /// Documents aggregated into the group.
    pub file_count: usize,

    /// Guides across those documents.
    pub guide_count: usize,

    /// XML-declared total across the group.
    pub xml_total: Decimal,

    /// Statement-side values; empty when the key found no match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presented: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withheld: Option<Decimal>,

    /// XML total minus statement presented value (zero when unmatched).
    pub presented_diff: Decimal,

    /// `|presented_diff| <= tolerance`.
    pub presented_matches: bool,

    /// `|presented - (approved + withheld)| <= tolerance`.
    pub statement_consistent: bool,

    /// First XML-declared lot seen in the group, normalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_lot: Option<String>,

    /// Filename lot of the group's first file, normalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_lot: Option<String>,
}

#[derive(Default)]
struct Group {
    kind: DocumentKind,
    lot: Option<String>,
    file_count: usize,
    guide_count: usize,
    total: Decimal,
    xml_lot: Option<String>,
    file_lot: Option<String>,
}

/// Group summaries by composite key and merge with the statement bank.
///
/// Never fails: an unmatched key simply carries empty statement-side
/// fields.
pub fn reconcile(
    summaries: &[SummaryRecord],
    bank: &DemonstrativeBank,
    config: &ReconciliationConfig,
) -> Vec<ReconciliationRecord> {
    let known = bank.known_lots();
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();

    for summary in summaries {
        let xml_lot = normalize_lot(&summary.lot_number);
        let file_lot = lot_from_filename(&summary.file_name)
            .as_deref()
            .and_then(normalize_lot);
        let chosen = choose_lot(summary.kind, xml_lot.as_deref(), file_lot.as_deref(), &known);
        let key = composite_key(chosen.as_deref(), summary.kind);

        let group = groups.entry(key).or_insert_with(|| Group {
            kind: summary.kind,
            lot: chosen,
            xml_lot: xml_lot.clone(),
            file_lot: file_lot.clone(),
            ..Group::default()
        });
        group.file_count += 1;
        group.guide_count += summary.guide_count;
        group.total += summary.total;
    }

    let by_lot = bank.by_lot();
    let tolerance = config.tolerance;

    groups
        .into_iter()
        .map(|(key, group)| {
            let statement = group.lot.as_deref().and_then(|lot| by_lot.get(lot));
            let presented = statement.map(|s| s.presented);
            let approved = statement.map(|s| s.approved);
            let withheld = statement.map(|s| s.withheld);
            let period = statement.and_then(|s| {
                (!s.periods.is_empty()).then(|| s.periods.join(", "))
            });

            let presented_diff = presented
                .map(|value| group.total - value)
                .unwrap_or_default();
            let presented_matches = presented_diff.abs() <= tolerance;
            let statement_consistent = (presented.unwrap_or_default()
                - (approved.unwrap_or_default() + withheld.unwrap_or_default()))
            .abs()
                <= tolerance;

            debug!(
                "key {key}: {} file(s), xml total {}, presented {:?}",
                group.file_count, group.total, presented
            );

            ReconciliationRecord {
                key,
                lot: group.lot,
                kind: group.kind,
                period,
                file_count: group.file_count,
                guide_count: group.guide_count,
                xml_total: group.total,
                presented,
                approved,
                withheld,
                presented_diff,
                presented_matches,
                statement_consistent,
                xml_lot: group.xml_lot,
                file_lot: group.file_lot,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demonstrative::{parse_rows, Statement};
    use crate::models::config::DemonstrativeConfig;
    use calamine::Data;
    use pretty_assertions::assert_eq;

    fn known(lots: &[&str]) -> HashSet<&str> {
        lots.iter().copied().collect()
    }

    #[test]
    fn non_appeal_prefers_known_xml_lot() {
        let chosen = choose_lot(
            DocumentKind::Sadt,
            Some("481"),
            Some("999"),
            &known(&["481", "999"]),
        );
        assert_eq!(chosen.as_deref(), Some("481"));
    }

    #[test]
    fn prefix_heuristic_prefers_known_filename_lot() {
        // XML lot "48100" unknown, filename lot "481" known and a prefix
        let chosen = choose_lot(
            DocumentKind::Sadt,
            Some("48100"),
            Some("481"),
            &known(&["481"]),
        );
        assert_eq!(chosen.as_deref(), Some("481"));
    }

    #[test]
    fn appeal_prefers_known_filename_lot() {
        let chosen = choose_lot(
            DocumentKind::Appeal,
            Some("92400"),
            Some("132238"),
            &known(&["132238"]),
        );
        assert_eq!(chosen.as_deref(), Some("132238"));
    }

    #[test]
    fn appeal_falls_back_to_filename_then_xml() {
        let chosen = choose_lot(DocumentKind::Appeal, Some("92400"), Some("7"), &known(&[]));
        assert_eq!(chosen.as_deref(), Some("7"));

        let chosen = choose_lot(DocumentKind::Appeal, Some("92400"), None, &known(&[]));
        assert_eq!(chosen.as_deref(), Some("92400"));

        assert_eq!(choose_lot(DocumentKind::Appeal, None, None, &known(&[])), None);
    }

    #[test]
    fn composite_key_separates_kinds() {
        let appeal = composite_key(Some("100"), DocumentKind::Appeal);
        let sadt = composite_key(Some("100"), DocumentKind::Sadt);
        assert_eq!(appeal, "100__APPEAL");
        assert_eq!(sadt, "100__SADT");
        assert_ne!(appeal, sadt);
    }

    fn summary(file: &str, lot: &str, kind: DocumentKind, guides: usize, cents: i64) -> SummaryRecord {
        SummaryRecord {
            file_name: file.to_string(),
            lot_number: lot.to_string(),
            kind,
            guide_count: guides,
            total: Decimal::new(cents, 2),
            strategy: "declared-grand-total".to_string(),
            protocol: None,
            error: None,
        }
    }

    fn statement(rows: Vec<Vec<Data>>) -> Statement {
        let s = |text: &str| Data::String(text.to_string());
        let mut all = vec![
            vec![
                s("CPF/CNPJ"),
                s("Lote"),
                s("Competência"),
                s("Valor Apresentado"),
                s("Valor Apurado"),
                s("Valor Glosa"),
            ],
        ];
        all.extend(rows);
        parse_rows(all.iter().map(Vec::as_slice), &DemonstrativeConfig::default()).unwrap()
    }

    #[test]
    fn matched_group_reads_statement_values() {
        let s = |text: &str| Data::String(text.to_string());
        let mut bank = DemonstrativeBank::new();
        bank.merge(&statement(vec![vec![
            s("x"),
            s("555"),
            s("2025-01"),
            Data::Float(450.50),
            Data::Float(400.00),
            Data::Float(50.50),
        ]]));

        let summaries = vec![summary("lote 555.xml", "555", DocumentKind::Sadt, 2, 45050)];
        let records = reconcile(&summaries, &bank, &ReconciliationConfig::default());

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.key, "555__SADT");
        assert_eq!(record.period.as_deref(), Some("2025-01"));
        assert_eq!(record.presented, Some(Decimal::new(45050, 2)));
        assert_eq!(record.presented_diff, Decimal::ZERO);
        assert!(record.presented_matches);
        assert!(record.statement_consistent);
    }

    #[test]
    fn appeal_resolves_through_filename_lot() {
        let s = |text: &str| Data::String(text.to_string());
        let mut bank = DemonstrativeBank::new();
        bank.merge(&statement(vec![vec![
            s("x"),
            s("132238"),
            s("2025-02"),
            Data::Float(1000.0),
            Data::Float(900.0),
            Data::Float(100.0),
        ]]));

        let summaries = vec![summary(
            "LOTE 132238 Recurso X.xml",
            "92400",
            DocumentKind::Appeal,
            3,
            100_000,
        )];
        let records = reconcile(&summaries, &bank, &ReconciliationConfig::default());

        assert_eq!(records[0].lot.as_deref(), Some("132238"));
        assert_eq!(records[0].key, "132238__APPEAL");
        assert_eq!(records[0].presented, Some(Decimal::from(1000)));
        assert_eq!(records[0].xml_lot.as_deref(), Some("92400"));
        assert_eq!(records[0].file_lot.as_deref(), Some("132238"));
    }

    #[test]
    fn unmatched_key_reads_empty_statement_fields() {
        let bank = DemonstrativeBank::new();
        let summaries = vec![summary("lote 9.xml", "9", DocumentKind::Consultation, 1, 10_000)];
        let records = reconcile(&summaries, &bank, &ReconciliationConfig::default());

        let record = &records[0];
        assert_eq!(record.presented, None);
        assert_eq!(record.period, None);
        assert_eq!(record.presented_diff, Decimal::ZERO);
    }

    #[test]
    fn groups_aggregate_files_and_guides() {
        let bank = DemonstrativeBank::new();
        let summaries = vec![
            summary("lote 7 a.xml", "7", DocumentKind::Sadt, 2, 10_000),
            summary("lote 7 b.xml", "7", DocumentKind::Sadt, 3, 5_000),
        ];
        let records = reconcile(&summaries, &bank, &ReconciliationConfig::default());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_count, 2);
        assert_eq!(records[0].guide_count, 5);
        assert_eq!(records[0].xml_total, Decimal::new(15_000, 2));
    }

    #[test]
    fn tolerance_bounds_the_presented_match() {
        let s = |text: &str| Data::String(text.to_string());
        let mut bank = DemonstrativeBank::new();
        bank.merge(&statement(vec![vec![
            s("x"),
            s("20"),
            s("2025-03"),
            Data::Float(100.00),
            Data::Float(60.00),
            Data::Float(30.00),
        ]]));

        // 100.02 declared vs 100.00 presented: off by more than 0.01
        let summaries = vec![summary("lote 20.xml", "20", DocumentKind::Sadt, 1, 10_002)];
        let records = reconcile(&summaries, &bank, &ReconciliationConfig::default());

        assert!(!records[0].presented_matches);
        assert_eq!(records[0].presented_diff, Decimal::new(2, 2));
        // 60 + 30 != 100 beyond tolerance
        assert!(!records[0].statement_consistent);
    }
}
