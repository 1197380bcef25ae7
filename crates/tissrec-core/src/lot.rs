//! Lot identifiers: filename extraction and canonical normalization.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

lazy_static! {
    /// `lote` token (any case, optional hyphen/underscore separators)
    /// followed by a digit run.
    static ref FILENAME_LOT: Regex = Regex::new(r"(?i)lote\s*[-_]*\s*(\d+)").unwrap();
}

/// First lot number embedded in a file name, if any.
///
/// Operates purely on the name string, independent of document content.
pub fn lot_from_filename(name: &str) -> Option<String> {
    FILENAME_LOT.captures(name).map(|caps| caps[1].to_string())
}

/// Canonical form of a lot identifier for equality comparison.
///
/// Spreadsheet cells round-trip integral lots as floats ("132238.0") and
/// XML sometimes zero-pads or punctuates; both sides collapse to the same
/// digit string. Strings without digits pass through unchanged.
pub fn normalize_lot(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(number) = Decimal::from_str(value) {
        if number.fract().is_zero() {
            return Some(number.trunc().normalize().to_string());
        }
    }
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        Some(value.to_string())
    } else {
        Some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn filename_lot_variants() {
        assert_eq!(lot_from_filename("LOTE 132238 Recurso X.xml"), Some("132238".into()));
        assert_eq!(lot_from_filename("lote_481.xml"), Some("481".into()));
        assert_eq!(lot_from_filename("Lote-92400-consulta.xml"), Some("92400".into()));
        assert_eq!(lot_from_filename("guias_enviadas.xml"), None);
    }

    #[test]
    fn first_digit_run_wins() {
        assert_eq!(lot_from_filename("lote 100 e lote 200.xml"), Some("100".into()));
    }

    #[test]
    fn normalization_collapses_spreadsheet_artifacts() {
        assert_eq!(normalize_lot("000123"), Some("123".into()));
        assert_eq!(normalize_lot("123"), Some("123".into()));
        assert_eq!(normalize_lot("123.0"), Some("123".into()));
    }

    #[test]
    fn non_numeric_text_keeps_its_digits() {
        assert_eq!(normalize_lot("LOTE-481"), Some("481".into()));
        assert_eq!(normalize_lot("sem numero"), Some("sem numero".into()));
    }

    #[test]
    fn empty_input_is_absent() {
        assert_eq!(normalize_lot(""), None);
        assert_eq!(normalize_lot("   "), None);
    }
}
