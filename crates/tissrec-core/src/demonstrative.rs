//! Payment demonstrative (.xlsx) parsing and the accumulating statement
//! bank.
//!
//! The payer's settlement statement lists presented, approved, and
//! withheld amounts per batch lot. Ingestion aggregates rows by
//! (normalized lot, period); the bank additively merges statements so
//! reconciliation always reads one consistent aggregate.

use calamine::{Data, Reader, Xlsx};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::error::DemonstrativeError;
use crate::lot::normalize_lot;
use crate::models::config::DemonstrativeConfig;

/// Required statement columns, by header name.
const COL_LOT: &str = "Lote";
const COL_PERIOD: &str = "Competência";
const COL_PRESENTED: &str = "Valor Apresentado";
const COL_APPROVED: &str = "Valor Apurado";
const COL_WITHHELD: &str = "Valor Glosa";

/// Aggregated statement values for one (lot, period).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemonstrativeEntry {
    /// Amount the provider billed.
    pub presented: Decimal,
    /// Amount the payer accepted.
    pub approved: Decimal,
    /// Amount the payer denied (glosa).
    pub withheld: Decimal,
    /// Source rows aggregated into this entry.
    pub rows: usize,
}

impl DemonstrativeEntry {
    fn absorb(&mut self, other: &DemonstrativeEntry) {
        self.presented += other.presented;
        self.approved += other.approved;
        self.withheld += other.withheld;
        self.rows += other.rows;
    }
}

/// One ingested demonstrative workbook, aggregated by (lot, period).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    entries: BTreeMap<(String, String), DemonstrativeEntry>,
}

impl Statement {
    /// Number of distinct (lot, period) aggregates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Statement-side totals for one lot across its periods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotTotals {
    pub presented: Decimal,
    pub approved: Decimal,
    pub withheld: Decimal,
    /// Distinct period labels, sorted.
    pub periods: Vec<String>,
}

/// Accumulating store of ingested demonstratives.
///
/// Merging is additive: merging two statements and reading the aggregate
/// equals aggregating the concatenation of their raw rows. `clear` is the
/// only other mutation; callers sharing the bank across threads guard it
/// with a single lock so reconciliation never reads a partial merge.
#[derive(Debug, Clone, Default)]
pub struct DemonstrativeBank {
    entries: BTreeMap<(String, String), DemonstrativeEntry>,
}

impl DemonstrativeBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additively merge one statement into the bank.
    pub fn merge(&mut self, statement: &Statement) {
        for (key, entry) in &statement.entries {
            self.entries.entry(key.clone()).or_default().absorb(entry);
        }
    }

    /// Drop every accumulated entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregated entries in (lot, period) order.
    pub fn entries(&self) -> impl Iterator<Item = (&(String, String), &DemonstrativeEntry)> {
        self.entries.iter()
    }

    /// Lots the statement side knows about.
    pub fn known_lots(&self) -> HashSet<&str> {
        self.entries.keys().map(|(lot, _)| lot.as_str()).collect()
    }

    /// Per-lot totals with values summed across periods.
    pub fn by_lot(&self) -> BTreeMap<&str, LotTotals> {
        let mut out: BTreeMap<&str, LotTotals> = BTreeMap::new();
        for ((lot, period), entry) in &self.entries {
            let totals = out.entry(lot.as_str()).or_default();
            totals.presented += entry.presented;
            totals.approved += entry.approved;
            totals.withheld += entry.withheld;
            if !totals.periods.iter().any(|p| p == period) {
                totals.periods.push(period.clone());
            }
        }
        out
    }
}

/// Read a demonstrative workbook from a file path.
pub fn read_statement_file(
    path: &Path,
    config: &DemonstrativeConfig,
) -> Result<Statement, DemonstrativeError> {
    let file = std::fs::File::open(path).map_err(|e| DemonstrativeError::Workbook(e.to_string()))?;
    read_statement(BufReader::new(file), config)
}

/// Read a demonstrative workbook from any seekable byte stream.
pub fn read_statement<RS: Read + Seek>(
    reader: RS,
    config: &DemonstrativeConfig,
) -> Result<Statement, DemonstrativeError> {
    let mut workbook =
        Xlsx::new(reader).map_err(|e| DemonstrativeError::Workbook(e.to_string()))?;
    let range = workbook
        .worksheet_range(&config.sheet_name)
        .map_err(|_| DemonstrativeError::SheetNotFound(config.sheet_name.clone()))?;
    let statement = parse_rows(range.rows(), config)?;
    info!(
        "demonstrative ingested: {} aggregate(s) from sheet {:?}",
        statement.len(),
        config.sheet_name
    );
    Ok(statement)
}

/// Aggregate raw sheet rows into a statement.
///
/// The header row is the first whose leading cell equals the configured
/// anchor; all five named columns must be present on it. Rows whose lot
/// cell normalizes to nothing are unkeyable and skipped.
pub(crate) fn parse_rows<'a, I>(
    rows: I,
    config: &DemonstrativeConfig,
) -> Result<Statement, DemonstrativeError>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter();

    let header = rows
        .by_ref()
        .find(|row| {
            row.first()
                .is_some_and(|cell| cell_text(cell) == config.header_anchor)
        })
        .ok_or_else(|| DemonstrativeError::HeaderNotFound(config.header_anchor.clone()))?;

    let headers: Vec<String> = header.iter().map(cell_text).collect();
    let position = |name: &str| headers.iter().position(|h| h.as_str() == name);

    let required = [COL_LOT, COL_PERIOD, COL_PRESENTED, COL_APPROVED, COL_WITHHELD];
    let missing: Vec<String> = required
        .iter()
        .filter(|name| position(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DemonstrativeError::MissingColumns(missing));
    }

    // Presence checked just above.
    let lot_col = position(COL_LOT).unwrap_or_default();
    let period_col = position(COL_PERIOD).unwrap_or_default();
    let presented_col = position(COL_PRESENTED).unwrap_or_default();
    let approved_col = position(COL_APPROVED).unwrap_or_default();
    let withheld_col = position(COL_WITHHELD).unwrap_or_default();

    let mut entries: BTreeMap<(String, String), DemonstrativeEntry> = BTreeMap::new();
    for row in rows {
        let Some(lot) = row.get(lot_col).map(cell_text).as_deref().and_then(normalize_lot) else {
            continue;
        };
        let period = row.get(period_col).map(cell_text).unwrap_or_default();
        let entry = entries.entry((lot, period)).or_default();
        entry.presented += cell_decimal(row.get(presented_col));
        entry.approved += cell_decimal(row.get(approved_col));
        entry.withheld += cell_decimal(row.get(withheld_col));
        entry.rows += 1;
    }

    Ok(Statement { entries })
}

/// Cell as trimmed text; integral floats print without a fraction so lot
/// numbers survive the float round-trip.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        Data::Int(n) => format!("{n}"),
        Data::Bool(b) => format!("{b}"),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Empty | Data::Error(_) => String::new(),
    }
}

/// Cell coerced to a decimal; non-parseable cells read as zero.
fn cell_decimal(cell: Option<&Data>) -> Decimal {
    match cell {
        Some(Data::Float(n)) => Decimal::from_f64_retain(*n).unwrap_or_default(),
        Some(Data::Int(n)) => Decimal::from(*n),
        Some(Data::String(s)) => {
            Decimal::from_str(&s.trim().replace(',', ".")).unwrap_or_default()
        }
        _ => Decimal::ZERO,
    }
}
