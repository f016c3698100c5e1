//! Token patterns shared by coercion and line-item classification.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Plain run of digits.
    pub static ref INTEGER_TOKEN: Regex = Regex::new(r"^\d+$").unwrap();

    /// Digits with optional thousand groups and a fractional part ("3.50", "1,234.56").
    pub static ref DECIMAL_TOKEN: Regex = Regex::new(
        r"^\d+(?:[.,\s]\d{3})*[.,]\d{1,3}$"
    ).unwrap();

    /// Anything amount-like: digits separated by `.`, `,` or spaces.
    pub static ref NUMERIC_TOKEN: Regex = Regex::new(
        r"^\d+(?:[.,\s]\d+)*$"
    ).unwrap();

    /// Purely alphabetic token.
    pub static ref ALPHA_TOKEN: Regex = Regex::new(r"^[A-Za-z]+$").unwrap();

    /// One item per text line: no, name, qty, unit, price, total.
    pub static ref ITEM_LINE: Regex = Regex::new(
        r"(?m)^\s*(\d+)\s+(.+?)\s+([\d.,]+)\s+([A-Za-z]+)\s+([\d.,]+)\s+([\d.,]+)\s*$"
    ).unwrap();
}

/// Whether `token` contains at least one letter.
pub fn has_alpha(token: &str) -> bool {
    token.chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_token() {
        assert!(DECIMAL_TOKEN.is_match("3.50"));
        assert!(DECIMAL_TOKEN.is_match("1,234.56"));
        assert!(DECIMAL_TOKEN.is_match("7,00"));
        assert!(!DECIMAL_TOKEN.is_match("7"));
        assert!(!DECIMAL_TOKEN.is_match("pcs"));
    }

    #[test]
    fn test_item_line() {
        let caps = ITEM_LINE.captures("  2 Bros Buns 100.000 PCS 0.25 25.00").unwrap();
        assert_eq!(&caps[1], "2");
        assert_eq!(&caps[2], "Bros Buns");
        assert_eq!(&caps[3], "100.000");
        assert_eq!(&caps[4], "PCS");
        assert_eq!(&caps[6], "25.00");
    }
}
