//! Amount parsing tolerant of OCR spacing and mixed separators.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse an amount such as "1 234,56", "1,234.56", "55.00" or "7".
///
/// When both separators appear the last one is the decimal point. A lone
/// comma followed by exactly three digits groups thousands ("12,500"); a
/// dot needs to repeat before it does ("1.234.567").
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if is_thousands_grouped(&cleaned, ',', 2) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        (None, Some(_)) if is_thousands_grouped(&cleaned, '.', 3) => cleaned.replace('.', ""),
        _ => cleaned,
    };

    Decimal::from_str(normalized.trim_end_matches('.')).ok()
}

/// At least `min_groups` groups, a leading group of one to three digits and
/// three digits in every group after it.
fn is_thousands_grouped(s: &str, sep: char, min_groups: usize) -> bool {
    let groups: Vec<&str> = s.split(sep).collect();
    groups.len() >= min_groups
        && (1..=3).contains(&groups[0].len())
        && groups[1..].iter().all(|g| g.len() == 3)
}

/// Quantities like "100.000" carry no fractional meaning.
pub fn normalize_quantity(quantity: Decimal) -> Decimal {
    if quantity.fract().is_zero() {
        quantity.trunc().normalize()
    } else {
        quantity.normalize()
    }
}
