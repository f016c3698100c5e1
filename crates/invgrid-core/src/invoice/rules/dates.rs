//! Date validation for extracted date fields.

use chrono::NaiveDate;

/// Accepted printed formats, day-first before ISO. Month-first is the last
/// resort, for dates like "12/31/2024" that no day-first reading accepts.
const DATE_FORMATS: [&str; 5] = ["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%Y-%m-%d", "%m/%d/%Y"];

/// Parse a printed date; the caller keeps the original text.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert_eq!(parse_date("01/02/2024"), expected);
        assert_eq!(parse_date("01.02.2024"), expected);
        assert_eq!(parse_date("01-02-2024"), expected);
        assert_eq!(parse_date("2024-02-01"), expected);
    }

    #[test]
    fn test_month_first_fallback() {
        assert_eq!(parse_date("12/31/2024"), NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(parse_date("02/29/2024"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date("13/31/2024"), None);
    }

    #[test]
    fn test_parse_date_rejects_invalid() {
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }
}
