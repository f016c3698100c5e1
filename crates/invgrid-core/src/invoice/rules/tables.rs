//! Built-in rule tables and layout selection.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{Coercion, FieldRule, RuleSpec};
use crate::error::ConfigError;
use crate::models::config::ExtractionConfig;
use crate::models::record::{FieldKey, FieldValue};

/// Layout value that asks for inference from the page text.
pub const AUTO_LAYOUT: &str = "auto";

/// Amount as printed in English layouts: "55.00", "1,234.56".
const EN_AMOUNT: &str = r"(\d[\d,]*(?:\.\d+)?)";

/// Amount as printed in Polish layouts: "1 234,56".
const PL_AMOUNT: &str = r"(\d{1,3}(?:[ \u{00a0}]?\d{3})*(?:[,.]\d{2})?)";

/// Built-in English rules, tuned for OCR noise on single-page retail invoices.
pub fn english_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            "Sales_Invoice_No",
            r"\b(?:Invoice[ \t]+No\.?[ \t]*[:|#\-]?|No\.?[ \t]*[:|#\-])[ \t]*(\d+)",
            Coercion::Integer,
        ),
        RuleSpec::new(
            "Customer_Name",
            r"\bCustomer\b[ \t]*[:|\-]?[ \t]*([^\n]+)",
            Coercion::Text,
        )
        .with_scrub(&[r"s\) Cle al ¢ 6 8 ae"]),
        RuleSpec::new(
            "Date",
            r"\bDate[ \t]*[:|\-]?[ \t]*(\d{1,2}[/.\-]\d{1,2}[/.\-]\d{4}|\d{4}-\d{2}-\d{2})",
            Coercion::Date,
        ),
        RuleSpec::new(
            "TAX_NUMBER",
            r"\bTAX[ \t]+(?:NUMBER|NO\.?)[ \t]*[:|\-]?[ \t]*(\d+)",
            Coercion::Integer,
        ),
        RuleSpec::new(
            "Company_Name",
            r"^[ \t]*([^\n]*\b(?:COMPANY|TRADING|LTD\.?|LLC|INC\.?|GMBH)\b[^\n]*)",
            Coercion::Text,
        )
        .with_scrub(&["% whistle", "=", "\""]),
        RuleSpec::new(
            "Company_Address_Contact",
            r"\b(?:COMPANY|TRADING|LTD|LLC|INC|GMBH)\b[^\n]*\n(.+?)\n[ \t]*(?:Sales[ \t]+Invoice|Invoice|No\b|Item|QTY|Customer)",
            Coercion::Text,
        )
        .with_scrub(&[r"WO \\ ", r"AlMugabalein, Arman\. Jo a", r"\bad a\b"]),
        RuleSpec::new(
            "Total_Summary",
            &format!(r"^[^\w\n]*(?:Grand[ \t]+)?(?:Total|Tota|otal)\b[ \t]*[~:|\-]?[ \t]*{EN_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new(
            "Discount",
            &format!(r"\bDiscount\b[ \t]*[~:|\-]?[ \t]*{EN_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new(
            "Net_Amount",
            &format!(r"\b(?:Net(?:[ \t]+Amount)?|Nets|Sone)\b[ \t]*[~:|\-]?[ \t]*{EN_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new(
            "Sales_Tax",
            &format!(r"\bSales[ \t]+tax\b[ \t]*[~:|\-]?[ \t]*{EN_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new("Note", r"\bNote\b[ \t]*[:|\-]?[ \t]*(\d+)", Coercion::Integer),
    ]
}

/// Built-in Polish rules (faktura VAT).
pub fn polish_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            "Sales_Invoice_No",
            r"\bFaktura(?:[ \t]+VAT)?[ \t]+(?:nr|numer)\.?[ \t]*:?[ \t]*([A-Z0-9][A-Z0-9/\-]*)",
            Coercion::Text,
        ),
        RuleSpec::new(
            "Customer_Name",
            r"\bNabywca[ \t]*:?[ \t]*\n?[ \t]*([^\n]+)",
            Coercion::Text,
        ),
        RuleSpec::new(
            "Date",
            r"\bData[ \t]+wystawienia[ \t]*:?[ \t]*(\d{1,2}[./\-]\d{1,2}[./\-]\d{4}|\d{4}-\d{2}-\d{2})",
            Coercion::Date,
        ),
        RuleSpec::new(
            "TAX_NUMBER",
            r"\bNIP[ \t]*:?[ \t]*(\d{3}-?\d{3}-?\d{2}-?\d{2}|\d{3}-?\d{2}-?\d{2}-?\d{3})",
            Coercion::Text,
        ),
        RuleSpec::new(
            "Company_Name",
            r"\bSprzedawca[ \t]*:?[ \t]*\n?[ \t]*([^\n]+)",
            Coercion::Text,
        ),
        RuleSpec::new(
            "Company_Address_Contact",
            r"\bSprzedawca[ \t]*:?[ \t]*\n?[ \t]*[^\n]+\n([^\n]+)",
            Coercion::Text,
        ),
        RuleSpec::new(
            "Total_Summary",
            &format!(r"\b(?:Razem|Do[ \t]+zap[łl]aty|Brutto)\b[ \t]*:?[ \t]*{PL_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new(
            "Discount",
            &format!(r"\bRabat\b[ \t]*:?[ \t]*{PL_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new(
            "Net_Amount",
            &format!(r"\b(?:Warto[śs][ćc][ \t]+)?netto\b[ \t]*:?[ \t]*{PL_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new(
            "Sales_Tax",
            &format!(r"\b(?:Kwota|Podatek)[ \t]+VAT\b[ \t]*:?[ \t]*{PL_AMOUNT}"),
            Coercion::Number,
        ),
        RuleSpec::new("Note", r"\bUwagi[ \t]*:?[ \t]*([^\n]+)", Coercion::Text),
    ]
}

fn markers(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Ordered rules for one layout.
#[derive(Debug, Clone)]
pub struct RuleTable {
    name: String,
    markers: Vec<String>,
    rules: Vec<FieldRule>,
}

impl RuleTable {
    /// Compile a table; `markers` are lowercase keywords used by inference.
    pub fn compile(
        name: &str,
        markers: Vec<String>,
        specs: &[RuleSpec],
    ) -> Result<Self, ConfigError> {
        let rules = specs
            .iter()
            .map(FieldRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Number of marker keywords found in lowercased page text.
    pub fn score(&self, lowered: &str) -> usize {
        self.markers
            .iter()
            .filter(|m| lowered.contains(m.as_str()))
            .count()
    }

    /// Apply every rule. Fields without a rule keep `N/A`; when two
    /// rules target one field the first non-missing value wins.
    pub fn apply(&self, text: &str) -> BTreeMap<FieldKey, FieldValue> {
        let mut values: BTreeMap<FieldKey, FieldValue> = FieldKey::ALL
            .into_iter()
            .map(|k| (k, FieldValue::Missing))
            .collect();

        for rule in &self.rules {
            let slot = values.entry(rule.key()).or_default();
            if slot.is_missing() {
                *slot = rule.apply(text);
            }
        }

        values
    }
}

/// Every available rule table, keyed by layout name.
#[derive(Debug, Clone)]
pub struct RuleBook {
    tables: BTreeMap<String, RuleTable>,
    layout: String,
    default_layout: String,
}

impl RuleBook {
    /// Built-in tables only.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_config(&ExtractionConfig::default())
    }

    /// Built-in tables plus configured ones. A configured table with a
    /// built-in name replaces its rules and keeps its markers.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        let mut tables = BTreeMap::new();

        let en = RuleTable::compile(
            "en",
            markers(&[
                "invoice", "customer", "tax number", "discount", "sales tax", "total", "qty",
                "net",
            ]),
            &english_rules(),
        )?;
        let pl = RuleTable::compile(
            "pl",
            markers(&[
                "faktura", "nabywca", "sprzedawca", "nip", "netto", "brutto", "razem",
                "wystawienia", "zapłaty",
            ]),
            &polish_rules(),
        )?;
        tables.insert(en.name.clone(), en);
        tables.insert(pl.name.clone(), pl);

        for (name, specs) in &config.rule_tables {
            let markers = tables
                .get(name)
                .map(|t: &RuleTable| t.markers.clone())
                .unwrap_or_default();
            let table = RuleTable::compile(name, markers, specs)?;
            debug!("Loaded rule table {} ({} rules)", name, table.rules.len());
            tables.insert(name.clone(), table);
        }

        if !tables.contains_key(&config.default_layout) {
            return Err(ConfigError::UnknownLayout(config.default_layout.clone()));
        }
        if config.layout != AUTO_LAYOUT && !tables.contains_key(&config.layout) {
            return Err(ConfigError::UnknownLayout(config.layout.clone()));
        }

        Ok(Self {
            tables,
            layout: config.layout.clone(),
            default_layout: config.default_layout.clone(),
        })
    }

    pub fn layouts(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&RuleTable> {
        self.tables.get(name)
    }

    /// Table for this page: the configured one, or the inferred one in auto mode.
    pub fn select(&self, text: &str) -> Option<&RuleTable> {
        let name = if self.layout == AUTO_LAYOUT {
            self.detect_layout(text)
        } else {
            self.layout.as_str()
        };
        self.tables.get(name)
    }

    /// Highest-scoring layout; ties and pages with no markers use the default.
    pub fn detect_layout(&self, text: &str) -> &str {
        let lowered = text.to_lowercase();

        let scores: Vec<(&str, usize)> = self
            .tables
            .values()
            .map(|t| (t.name(), t.score(&lowered)))
            .collect();
        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let leaders: Vec<&str> = scores
            .iter()
            .filter(|(_, s)| *s == best)
            .map(|(n, _)| *n)
            .collect();

        let layout = match leaders.as_slice() {
            [only] if best > 0 => *only,
            _ => self.default_layout.as_str(),
        };

        info!("Detected layout: {} (score {})", layout, best);
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const ENGLISH_PAGE: &str = "\
BREAD BASKET BAKERY COMPANY
Al-Muqabalein, Amman
Tel 06 555 1234
Sales Invoice No: 4021
Customer: Acme Co
Date: 01/02/2024
TAX NUMBER: 998877
No Item Qty Unit Price Total
1 Cheese Burger 2 pcs 3.50 7.00
Total ~ 55.00
Discount 5.00
Net | 50.00
Sales tax | 8.00
Note 3
";

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn number(s: &str) -> FieldValue {
        FieldValue::Number(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_english_invoice() {
        let book = RuleBook::builtin().unwrap();
        let table = book.select(ENGLISH_PAGE).unwrap();
        assert_eq!(table.name(), "en");

        let values = table.apply(ENGLISH_PAGE);
        assert_eq!(values[&FieldKey::InvoiceNumber], text("4021"));
        assert_eq!(values[&FieldKey::CustomerName], text("Acme Co"));
        assert_eq!(values[&FieldKey::Date], text("01/02/2024"));
        assert_eq!(values[&FieldKey::TaxNumber], text("998877"));
        assert_eq!(values[&FieldKey::CompanyName], text("BREAD BASKET BAKERY COMPANY"));
        assert_eq!(
            values[&FieldKey::CompanyContact],
            text("Al-Muqabalein, Amman Tel 06 555 1234")
        );
        assert_eq!(values[&FieldKey::Total], number("55.00"));
        assert_eq!(values[&FieldKey::Discount], number("5.00"));
        assert_eq!(values[&FieldKey::NetAmount], number("50.00"));
        assert_eq!(values[&FieldKey::SalesTax], number("8.00"));
        assert_eq!(values[&FieldKey::Note], text("3"));
    }

    #[test]
    fn test_minimal_english_text() {
        let page = "Invoice No: 4021\nCustomer: Acme Co\nDate: 01/02/2024\n...Total: 55.00";
        let book = RuleBook::builtin().unwrap();
        let values = book.select(page).unwrap().apply(page);

        assert_eq!(values[&FieldKey::InvoiceNumber], text("4021"));
        assert_eq!(values[&FieldKey::CustomerName], text("Acme Co"));
        assert_eq!(values[&FieldKey::Date], text("01/02/2024"));
        assert_eq!(values[&FieldKey::Total], number("55.00"));
        assert_eq!(values[&FieldKey::Discount], FieldValue::Missing);
    }

    #[test]
    fn test_english_separators() {
        let book = RuleBook::builtin().unwrap();

        for sep in [": ", " - ", " | ", " "] {
            let page = format!(
                "Invoice No{sep}4021\nCustomer{sep}Acme Co\nDate{sep}01/02/2024\n\
                 TAX NUMBER{sep}998877\nTotal{sep}55.00\nDiscount{sep}5.00\n\
                 Net{sep}50.00\nSales tax{sep}8.00\nNote{sep}3\n"
            );
            let values = book.select(&page).unwrap().apply(&page);

            assert_eq!(values[&FieldKey::InvoiceNumber], text("4021"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::CustomerName], text("Acme Co"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::Date], text("01/02/2024"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::TaxNumber], text("998877"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::Total], number("55.00"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::Discount], number("5.00"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::NetAmount], number("50.00"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::SalesTax], number("8.00"), "sep {:?}", sep);
            assert_eq!(values[&FieldKey::Note], text("3"), "sep {:?}", sep);
        }
    }

    #[test]
    fn test_colons_dropped_by_ocr() {
        let page = "Invoice No 4021\nCustomer Acme Co\nDate 01/02/2024\nTotal 55.00\n";
        let values = RuleBook::builtin().unwrap().select(page).unwrap().apply(page);

        assert_eq!(values[&FieldKey::InvoiceNumber], text("4021"));
        assert_eq!(values[&FieldKey::CustomerName], text("Acme Co"));
        assert_eq!(values[&FieldKey::Date], text("01/02/2024"));
        assert_eq!(values[&FieldKey::Total], number("55.00"));
    }

    #[test]
    fn test_tax_number_is_not_invoice_number() {
        let page = "TAX NO 998877\nInvoice No 4021\n";
        let values = RuleBook::builtin().unwrap().get("en").unwrap().apply(page);
        assert_eq!(values[&FieldKey::InvoiceNumber], text("4021"));
        assert_eq!(values[&FieldKey::TaxNumber], text("998877"));
    }

    #[test]
    fn test_english_comma_thousands() {
        let page = "Total: 1,234\nDiscount: 12,500\nNet: 1,234,567.50\n";
        let values = RuleBook::builtin().unwrap().get("en").unwrap().apply(page);

        assert_eq!(values[&FieldKey::Total], number("1234"));
        assert_eq!(values[&FieldKey::Discount], number("12500"));
        assert_eq!(values[&FieldKey::NetAmount], number("1234567.50"));
    }

    #[test]
    fn test_month_first_date_is_kept() {
        let page = "Date: 12/31/2024\n";
        let values = RuleBook::builtin().unwrap().get("en").unwrap().apply(page);
        assert_eq!(values[&FieldKey::Date], text("12/31/2024"));
    }

    #[test]
    fn test_subtotal_is_not_total() {
        let page = "Sub total 40.00\nTotal: 46.00\n";
        let values = RuleBook::builtin().unwrap().get("en").unwrap().apply(page);
        assert_eq!(values[&FieldKey::Total], number("46.00"));
    }

    #[test]
    fn test_polish_invoice() {
        let page = "\
Faktura VAT nr FV/12/2024
Data wystawienia: 15.03.2024
Sprzedawca:
Piekarnia Sp. z o.o.
ul. Długa 5, Gdańsk
NIP: 123-456-32-18
Nabywca: Jan Kowalski
Wartość netto: 1 000,00
Kwota VAT: 230,00
Razem: 1 230,00
";
        let book = RuleBook::builtin().unwrap();
        let table = book.select(page).unwrap();
        assert_eq!(table.name(), "pl");

        let values = table.apply(page);
        assert_eq!(values[&FieldKey::InvoiceNumber], text("FV/12/2024"));
        assert_eq!(values[&FieldKey::Date], text("15.03.2024"));
        assert_eq!(values[&FieldKey::CompanyName], text("Piekarnia Sp. z o.o."));
        assert_eq!(values[&FieldKey::CompanyContact], text("ul. Długa 5, Gdańsk"));
        assert_eq!(values[&FieldKey::TaxNumber], text("123-456-32-18"));
        assert_eq!(values[&FieldKey::CustomerName], text("Jan Kowalski"));
        assert_eq!(values[&FieldKey::NetAmount], number("1000.00"));
        assert_eq!(values[&FieldKey::SalesTax], number("230.00"));
        assert_eq!(values[&FieldKey::Total], number("1230.00"));
    }

    #[test]
    fn test_empty_text_uses_default_layout_and_sentinels() {
        let book = RuleBook::builtin().unwrap();
        assert_eq!(book.detect_layout(""), "en");

        let values = book.select("").unwrap().apply("");
        assert_eq!(values.len(), FieldKey::ALL.len());
        assert!(values.values().all(FieldValue::is_missing));
    }

    #[test]
    fn test_explicit_layout_skips_inference() {
        let config = ExtractionConfig {
            layout: "pl".to_string(),
            ..ExtractionConfig::default()
        };
        let book = RuleBook::from_config(&config).unwrap();
        assert_eq!(book.select("Invoice Customer Total").unwrap().name(), "pl");
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let config = ExtractionConfig {
            layout: "fr".to_string(),
            ..ExtractionConfig::default()
        };
        assert!(matches!(
            RuleBook::from_config(&config),
            Err(ConfigError::UnknownLayout(_))
        ));
    }

    #[test]
    fn test_configured_table_replaces_builtin() {
        let mut config = ExtractionConfig::default();
        config.rule_tables.insert(
            "en".to_string(),
            vec![RuleSpec::new("Sales_Invoice_No", r"Bill\s*#\s*(\d+)", Coercion::Integer)],
        );
        let book = RuleBook::from_config(&config).unwrap();

        let values = book.select("Invoice Bill # 77").unwrap().apply("Invoice Bill # 77");
        assert_eq!(values[&FieldKey::InvoiceNumber], text("77"));
        assert_eq!(values[&FieldKey::Total], FieldValue::Missing);
    }

    #[test]
    fn test_bad_configured_pattern_fails_at_build() {
        let mut config = ExtractionConfig::default();
        config.rule_tables.insert(
            "custom".to_string(),
            vec![RuleSpec::new("Date", r"(unclosed", Coercion::Date)],
        );
        assert!(matches!(
            RuleBook::from_config(&config),
            Err(ConfigError::Pattern { .. })
        ));
    }
}
