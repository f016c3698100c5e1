//! Line-item reconciliation over the reconstructed table.
//!
//! A row is an item when it has the expected shape
//! `[no, name…, qty, unit, price, total]`, or failing that when one of its
//! cells mentions a configured item keyword. Shape wins when both apply.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::rules::patterns::{
    ALPHA_TOKEN, DECIMAL_TOKEN, INTEGER_TOKEN, ITEM_LINE, NUMERIC_TOKEN, has_alpha,
};
use super::rules::{normalize_quantity, parse_amount};
use crate::error::DegradedExtraction;
use crate::models::config::ExtractionConfig;
use crate::models::record::{LineItem, NOT_AVAILABLE};

/// How a row was recognized as an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Shape,
    Keyword,
    Other,
}

/// Items found in a table, plus rows that were skipped.
#[derive(Debug, Default)]
pub struct Reconciled {
    pub items: Vec<LineItem>,
    pub diagnostics: Vec<DegradedExtraction>,
}

/// Maps table rows onto line items.
#[derive(Debug, Clone)]
pub struct LineItemReconciler {
    keywords: Vec<String>,
    units: HashSet<String>,
}

impl LineItemReconciler {
    pub fn new(keywords: &[String], units: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            units: units.iter().map(|u| u.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(&config.item_keywords, &config.unit_tokens)
    }

    /// Classify a row, shape first. Keyword rows need at least one number.
    pub fn classify(&self, row: &[String]) -> RowKind {
        if is_shaped(row) {
            RowKind::Shape
        } else if has_numeric_token(row) && self.mentions_keyword(row) {
            RowKind::Keyword
        } else {
            RowKind::Other
        }
    }

    /// Reconcile every row of a text grid, in row order.
    pub fn reconcile(&self, rows: &[Vec<String>]) -> Reconciled {
        let mut result = Reconciled::default();

        for (index, row) in rows.iter().enumerate() {
            let parsed = match self.classify(row) {
                RowKind::Shape => from_shape(row),
                RowKind::Keyword => self.from_keywords(row, result.items.len() + 1),
                RowKind::Other => continue,
            };

            match parsed {
                Ok(item) => result.items.push(item),
                Err(reason) => {
                    warn!("Skipping malformed item row {}: {}", index, reason);
                    result
                        .diagnostics
                        .push(DegradedExtraction::MalformedRow { row: index, reason });
                }
            }
        }

        debug!(
            "Reconciled {} items from {} rows",
            result.items.len(),
            rows.len()
        );
        result
    }

    /// Items from whole-page text, one per matching line.
    pub fn from_text(&self, text: &str) -> Vec<LineItem> {
        let mut items = Vec::new();

        for caps in ITEM_LINE.captures_iter(text) {
            match build_item(&caps[1], &caps[2], &caps[3], &caps[4], &caps[5], &caps[6]) {
                Ok(item) => items.push(item),
                Err(reason) => debug!("Skipping malformed item line {:?}: {}", &caps[0], reason),
            }
        }

        debug!("Found {} items in page text", items.len());
        items
    }

    fn mentions_keyword(&self, row: &[String]) -> bool {
        row.iter().any(|cell| {
            let lowered = cell.to_lowercase();
            self.keywords.iter().any(|k| lowered.contains(k.as_str()))
        })
    }

    fn is_unit(&self, token: &str) -> bool {
        ALPHA_TOKEN.is_match(token) && self.units.contains(&token.to_lowercase())
    }

    fn from_keywords(&self, row: &[String], running_index: usize) -> Result<LineItem, String> {
        let numbered = row.first().is_some_and(|c| INTEGER_TOKEN.is_match(c.trim()));
        let item_no = if numbered {
            row[0].trim().to_string()
        } else {
            running_index.to_string()
        };
        let rest = if numbered { &row[1..] } else { row };

        let tokens: Vec<&str> = rest.iter().flat_map(|c| c.split_whitespace()).collect();

        let quantity = tokens
            .iter()
            .find(|t| INTEGER_TOKEN.is_match(t))
            .and_then(|t| parse_amount(t))
            .ok_or("no quantity")?;

        let decimals: Vec<Decimal> = tokens
            .iter()
            .filter(|t| DECIMAL_TOKEN.is_match(t))
            .filter_map(|t| parse_amount(t))
            .collect();
        let (Some(unit_price), Some(total_price)) = (decimals.first(), decimals.last()) else {
            return Err("no price".to_string());
        };

        let name = rest
            .iter()
            .map(|c| c.trim())
            .find(|c| has_alpha(c) && !self.is_unit(c))
            .map(clean_name)
            .ok_or("no name")?;

        let unit = tokens
            .iter()
            .find(|t| self.is_unit(t))
            .map(|t| t.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        Ok(LineItem {
            item_no,
            name,
            quantity: normalize_quantity(quantity),
            unit,
            unit_price: *unit_price,
            total_price: *total_price,
        })
    }
}

/// `[integer, name…, numeric, alpha, amount, amount]` with a non-empty name.
fn has_numeric_token(row: &[String]) -> bool {
    row.iter()
        .flat_map(|c| c.split_whitespace())
        .any(|t| NUMERIC_TOKEN.is_match(t))
}

fn is_shaped(row: &[String]) -> bool {
    let n = row.len();
    if n < 6 {
        return false;
    }
    let cell = |i: usize| row[i].trim();

    INTEGER_TOKEN.is_match(cell(0))
        && NUMERIC_TOKEN.is_match(cell(n - 1))
        && NUMERIC_TOKEN.is_match(cell(n - 2))
        && ALPHA_TOKEN.is_match(cell(n - 3))
        && NUMERIC_TOKEN.is_match(cell(n - 4))
        && row[1..n - 4].iter().any(|c| !c.trim().is_empty())
}

fn from_shape(row: &[String]) -> Result<LineItem, String> {
    let n = row.len();
    let name = row[1..n - 4]
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    build_item(
        &row[0],
        &name,
        &row[n - 4],
        &row[n - 3],
        &row[n - 2],
        &row[n - 1],
    )
}

fn build_item(
    no: &str,
    name: &str,
    qty: &str,
    unit: &str,
    price: &str,
    total: &str,
) -> Result<LineItem, String> {
    let parse = |what: &str, s: &str| {
        parse_amount(s).ok_or_else(|| format!("unreadable {} {:?}", what, s))
    };

    let name = clean_name(name);
    if name.is_empty() {
        return Err("empty name".to_string());
    }

    Ok(LineItem {
        item_no: no.trim().to_string(),
        name,
        quantity: normalize_quantity(parse("quantity", qty)?),
        unit: unit.trim().to_string(),
        unit_price: parse("price", price)?,
        total_price: parse("total", total)?,
    })
}

/// Strip stray quotes and collapse whitespace.
fn clean_name(name: &str) -> String {
    name.replace(['"', '\u{201c}', '\u{201d}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
