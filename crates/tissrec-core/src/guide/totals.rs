//! Per-guide monetary totals with kind-specific fallback chains.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::ExtractionError;
use crate::num::parse_decimal;
use crate::xml::Element;

/// Which fallback path produced a guide's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TotalStrategy {
    /// `valorTotal/valorTotalGeral` declared on the guide.
    DeclaredGrandTotal,
    /// Sum of executed procedure items plus other-expense items.
    ItemizedSum,
    /// Sum of the named component fields of the guide's `valorTotal` block.
    ComponentSum,
    /// Consultation `procedimento/valorProcedimento`.
    ConsultationProcedureValue,
    /// Appeal `valorTotalRecursado`.
    AppealRecursedAmount,
    /// Nothing yielded a positive amount.
    Zero,
}

impl TotalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TotalStrategy::DeclaredGrandTotal => "declared-grand-total",
            TotalStrategy::ItemizedSum => "itemized-sum",
            TotalStrategy::ComponentSum => "component-sum",
            TotalStrategy::ConsultationProcedureValue => "consultation-procedure-value",
            TotalStrategy::AppealRecursedAmount => "appeal-recursed-amount",
            TotalStrategy::Zero => "zero",
        }
    }
}

/// Component fields of a SADT guide's `valorTotal` block (tier 3).
const TOTAL_COMPONENTS: [&str; 6] = [
    "valorProcedimentos",
    "valorDiarias",
    "valorTaxasAlugueis",
    "valorMateriais",
    "valorMedicamentos",
    "valorGasesMedicinais",
];

type Tier = (
    TotalStrategy,
    fn(&Element) -> Result<Decimal, ExtractionError>,
);

/// SADT fallback chain, in precedence order. First positive result wins.
const SADT_TIERS: [Tier; 3] = [
    (TotalStrategy::DeclaredGrandTotal, declared_grand_total),
    (TotalStrategy::ItemizedSum, itemized_sum),
    (TotalStrategy::ComponentSum, component_sum),
];

/// Total for one SADT guide and the strategy that produced it.
pub fn sadt_guide_total(guide: &Element) -> Result<(Decimal, TotalStrategy), ExtractionError> {
    for (strategy, tier) in SADT_TIERS {
        let value = tier(guide)?;
        if value > Decimal::ZERO {
            return Ok((value, strategy));
        }
    }
    Ok((Decimal::ZERO, TotalStrategy::Zero))
}

/// Tier 1: the guide's declared grand total (direct `valorTotal` block).
pub(crate) fn declared_grand_total(guide: &Element) -> Result<Decimal, ExtractionError> {
    match guide.child("valorTotal") {
        Some(block) => parse_decimal(block.child_text("valorTotalGeral")),
        None => Ok(Decimal::ZERO),
    }
}

/// Tier 2: executed procedure items plus other-expense items.
fn itemized_sum(guide: &Element) -> Result<Decimal, ExtractionError> {
    Ok(procedure_items(guide)? + other_expense_items(guide)?)
}

/// `procedimentoExecutado` items: declared item total when present,
/// else unit value times executed quantity when both are present.
pub(crate) fn procedure_items(guide: &Element) -> Result<Decimal, ExtractionError> {
    let mut total = Decimal::ZERO;
    for container in guide.find_all("procedimentosExecutados") {
        for item in container.children().filter(|c| c.name() == "procedimentoExecutado") {
            let declared = item.child_text("valorTotal");
            if !declared.is_empty() {
                total += parse_decimal(declared)?;
                continue;
            }
            let unit = item.child_text("valorUnitario");
            let quantity = item.child_text("quantidadeExecutada");
            if !unit.is_empty() && !quantity.is_empty() {
                total += parse_decimal(unit)? * parse_decimal(quantity)?;
            }
        }
    }
    Ok(total)
}

/// `outrasDespesas/despesa` items, valued by their executed-services total.
pub(crate) fn other_expense_items(guide: &Element) -> Result<Decimal, ExtractionError> {
    let mut total = Decimal::ZERO;
    for container in guide.find_all("outrasDespesas") {
        for expense in container.children().filter(|c| c.name() == "despesa") {
            let Some(services) = expense.child("servicosExecutados") else {
                continue;
            };
            total += parse_decimal(services.child_text("valorTotal"))?;
        }
    }
    Ok(total)
}

/// Tier 3: named monetary components of the `valorTotal` block.
fn component_sum(guide: &Element) -> Result<Decimal, ExtractionError> {
    let Some(block) = guide.child("valorTotal") else {
        return Ok(Decimal::ZERO);
    };
    let mut total = Decimal::ZERO;
    for field in TOTAL_COMPONENTS {
        total += parse_decimal(block.child_text(field))?;
    }
    Ok(total)
}

/// File-level strategy label for a set of per-guide strategy counts.
///
/// A single strategy reports its own name; anything else reports a
/// `mixed:` breakdown sorted by descending guide count, name for ties,
/// surfacing inconsistent source data to the operator.
pub(crate) fn file_strategy_label(strategies: &BTreeMap<TotalStrategy, usize>) -> String {
    let mut entries: Vec<(&'static str, usize)> = strategies
        .iter()
        .map(|(strategy, count)| (strategy.as_str(), *count))
        .collect();
    if entries.len() == 1 {
        return entries[0].0.to_string();
    }
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let parts: Vec<String> = entries
        .iter()
        .map(|(name, count)| format!("{name}={count}"))
        .collect();
    format!("mixed: {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;
    use pretty_assertions::assert_eq;

    fn guide(body: &str) -> Element {
        let raw = format!(
            r#"<ans:guiaSP-SADT xmlns:ans="http://www.ans.gov.br/padroes/tiss/schemas">{body}</ans:guiaSP-SADT>"#
        );
        xml::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn declared_grand_total_has_top_precedence() {
        let g = guide(
            "<ans:procedimentosExecutados><ans:procedimentoExecutado>
                <ans:valorTotal>999.99</ans:valorTotal>
            </ans:procedimentoExecutado></ans:procedimentosExecutados>
            <ans:valorTotal>
                <ans:valorProcedimentos>500.00</ans:valorProcedimentos>
                <ans:valorTotalGeral>300.00</ans:valorTotalGeral>
            </ans:valorTotal>",
        );
        let (value, strategy) = sadt_guide_total(&g).unwrap();
        assert_eq!(value, Decimal::new(30000, 2));
        assert_eq!(strategy, TotalStrategy::DeclaredGrandTotal);
    }

    #[test]
    fn zero_grand_total_falls_to_itemized_sum() {
        let g = guide(
            "<ans:valorTotal><ans:valorTotalGeral>0.00</ans:valorTotalGeral></ans:valorTotal>
            <ans:procedimentosExecutados>
                <ans:procedimentoExecutado><ans:valorTotal>100.50</ans:valorTotal></ans:procedimentoExecutado>
                <ans:procedimentoExecutado>
                    <ans:valorUnitario>25,00</ans:valorUnitario>
                    <ans:quantidadeExecutada>2</ans:quantidadeExecutada>
                </ans:procedimentoExecutado>
            </ans:procedimentosExecutados>
            <ans:outrasDespesas><ans:despesa>
                <ans:servicosExecutados><ans:valorTotal>10.00</ans:valorTotal></ans:servicosExecutados>
            </ans:despesa></ans:outrasDespesas>",
        );
        let (value, strategy) = sadt_guide_total(&g).unwrap();
        assert_eq!(value, Decimal::new(16050, 2));
        assert_eq!(strategy, TotalStrategy::ItemizedSum);
    }

    #[test]
    fn component_sum_is_the_last_resort() {
        let g = guide(
            "<ans:valorTotal>
                <ans:valorProcedimentos>80.00</ans:valorProcedimentos>
                <ans:valorMateriais>20.00</ans:valorMateriais>
            </ans:valorTotal>",
        );
        let (value, strategy) = sadt_guide_total(&g).unwrap();
        assert_eq!(value, Decimal::new(10000, 2));
        assert_eq!(strategy, TotalStrategy::ComponentSum);
    }

    #[test]
    fn nothing_positive_reports_zero() {
        let g = guide("<ans:valorTotal><ans:valorTotalGeral>0</ans:valorTotalGeral></ans:valorTotal>");
        let (value, strategy) = sadt_guide_total(&g).unwrap();
        assert_eq!(value, Decimal::ZERO);
        assert_eq!(strategy, TotalStrategy::Zero);
    }

    #[test]
    fn item_without_declared_total_uses_unit_times_quantity() {
        let g = guide(
            "<ans:procedimentosExecutados><ans:procedimentoExecutado>
                <ans:valorUnitario>12,50</ans:valorUnitario>
                <ans:quantidadeExecutada>3</ans:quantidadeExecutada>
            </ans:procedimentoExecutado></ans:procedimentosExecutados>",
        );
        assert_eq!(procedure_items(&g).unwrap(), Decimal::new(3750, 2));
    }

    #[test]
    fn malformed_amount_propagates() {
        let g = guide(
            "<ans:valorTotal><ans:valorTotalGeral>not-a-number</ans:valorTotalGeral></ans:valorTotal>",
        );
        assert!(sadt_guide_total(&g).is_err());
    }

    #[test]
    fn mixed_label_sorts_by_count_then_name() {
        let mut strategies = BTreeMap::new();
        strategies.insert(TotalStrategy::DeclaredGrandTotal, 1);
        strategies.insert(TotalStrategy::ItemizedSum, 3);
        strategies.insert(TotalStrategy::Zero, 1);
        assert_eq!(
            file_strategy_label(&strategies),
            "mixed: itemized-sum=3, declared-grand-total=1, zero=1"
        );
    }

    #[test]
    fn single_strategy_reports_its_own_name() {
        let mut strategies = BTreeMap::new();
        strategies.insert(TotalStrategy::DeclaredGrandTotal, 4);
        assert_eq!(file_strategy_label(&strategies), "declared-grand-total");
    }
}
