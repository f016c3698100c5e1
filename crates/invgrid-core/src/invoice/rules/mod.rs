//! Labeled pattern rules for header and summary fields.
//!
//! A rule is a regex with one capture group, a default and a coercion.
//! Applying a rule never fails: no match, an empty capture or a value
//! that does not coerce all produce the rule's default.

pub mod amounts;
pub mod dates;
pub mod patterns;
pub mod tables;

pub use amounts::{normalize_quantity, parse_amount};
pub use dates::parse_date;
pub use tables::{RuleBook, RuleTable};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoercionFailure, ConfigError};
use crate::models::record::{FieldKey, FieldValue};
use patterns::INTEGER_TOKEN;

/// How a captured string becomes a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Non-empty text, inner whitespace collapsed.
    #[default]
    Text,
    /// Amount parsed into a decimal.
    Number,
    /// Digits only, kept as text.
    Integer,
    /// A valid calendar date, kept as printed.
    Date,
}

impl Coercion {
    /// Cast `raw` or report why it could not be cast.
    pub fn apply(&self, label: &str, raw: &str) -> Result<FieldValue, CoercionFailure> {
        let failure = || CoercionFailure {
            label: label.to_string(),
            value: raw.to_string(),
        };

        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Err(failure());
        }

        match self {
            Coercion::Text => Ok(FieldValue::Text(collapsed)),
            Coercion::Number => parse_amount(&collapsed)
                .map(FieldValue::Number)
                .ok_or_else(failure),
            Coercion::Integer if INTEGER_TOKEN.is_match(&collapsed) => {
                Ok(FieldValue::Text(collapsed))
            }
            Coercion::Integer => Err(failure()),
            Coercion::Date => parse_date(&collapsed)
                .map(|_| FieldValue::Text(collapsed.clone()))
                .ok_or_else(failure),
        }
    }
}

fn default_group() -> usize {
    1
}

/// Serializable rule definition, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Field label, e.g. `Sales_Invoice_No`.
    pub label: String,

    /// Regex applied with case-insensitive, multi-line, dot-all flags.
    pub pattern: String,

    /// Capture group holding the value.
    #[serde(default = "default_group")]
    pub group: usize,

    /// Value used when the rule does not produce one; `N/A` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default)]
    pub coerce: Coercion,

    /// Patterns removed from the capture before coercion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scrub: Vec<String>,
}

impl RuleSpec {
    pub fn new(label: &str, pattern: &str, coerce: Coercion) -> Self {
        Self {
            label: label.to_string(),
            pattern: pattern.to_string(),
            group: 1,
            default: None,
            coerce,
            scrub: Vec::new(),
        }
    }

    pub fn with_scrub(mut self, patterns: &[&str]) -> Self {
        self.scrub = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct FieldRule {
    key: FieldKey,
    regex: Regex,
    group: usize,
    default: FieldValue,
    coerce: Coercion,
    scrub: Vec<Regex>,
}

impl FieldRule {
    /// Compile a rule; bad labels and patterns are configuration errors.
    pub fn compile(spec: &RuleSpec) -> Result<Self, ConfigError> {
        let key = FieldKey::from_label(&spec.label)
            .ok_or_else(|| ConfigError::UnknownField(spec.label.clone()))?;

        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .multi_line(true)
                .dot_matches_new_line(true)
                .build()
                .map_err(|source| ConfigError::Pattern {
                    label: spec.label.clone(),
                    source,
                })
        };

        let regex = build(&spec.pattern)?;
        if spec.group > regex.captures_len().saturating_sub(1) {
            return Err(ConfigError::Invalid {
                key: spec.label.clone(),
                reason: format!(
                    "group {} but pattern has {} capture groups",
                    spec.group,
                    regex.captures_len() - 1
                ),
            });
        }

        let scrub = spec
            .scrub
            .iter()
            .map(|p| build(p))
            .collect::<Result<Vec<_>, _>>()?;

        let default = match &spec.default {
            Some(raw) => spec
                .coerce
                .apply(&spec.label, raw)
                .unwrap_or_else(|_| FieldValue::Text(raw.clone())),
            None => FieldValue::Missing,
        };

        Ok(Self {
            key,
            regex,
            group: spec.group,
            default,
            coerce: spec.coerce,
            scrub,
        })
    }

    pub fn key(&self) -> FieldKey {
        self.key
    }

    /// Apply the rule to page text.
    pub fn apply(&self, text: &str) -> FieldValue {
        let label = self.key.label();

        let Some(captured) = self
            .regex
            .captures(text)
            .and_then(|caps| caps.get(self.group))
        else {
            debug!("{}: no match", label);
            return self.default.clone();
        };

        let mut value = captured.as_str().trim().to_string();
        for scrub in &self.scrub {
            value = scrub.replace_all(&value, "").trim().to_string();
        }

        match self.coerce.apply(label, &value) {
            Ok(v) => {
                debug!("{}: {:?}", label, v);
                v
            }
            Err(e) => {
                debug!("{}", e);
                self.default.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn rule(label: &str, pattern: &str, coerce: Coercion) -> FieldRule {
        FieldRule::compile(&RuleSpec::new(label, pattern, coerce)).unwrap()
    }

    #[test]
    fn test_no_match_gives_default() {
        let r = FieldRule::compile(
            &RuleSpec::new("Note", r"Note\s*(\d+)", Coercion::Integer).with_default("0"),
        )
        .unwrap();
        assert_eq!(r.apply("nothing here"), FieldValue::Text("0".to_string()));
    }

    #[test]
    fn test_rules_are_total() {
        let rules = [
            rule("Total_Summary", r"Total\s*([\d.]+)", Coercion::Number),
            rule("Date", r"Date:\s*(\S*)", Coercion::Date),
            rule("Sales_Invoice_No", r"No:\s*(\S*)", Coercion::Integer),
            rule("Customer_Name", r"Customer:\s*([^\n]*)", Coercion::Text),
        ];
        let inputs = ["", "Total .", "Date: 99/99/9999", "No: 12a", "Customer:   \n", "\u{0}\u{ffff}"];

        for r in &rules {
            for input in inputs {
                assert_eq!(r.apply(input), FieldValue::Missing, "{:?} on {:?}", r.key(), input);
            }
        }
    }

    #[test]
    fn test_flags_are_case_insensitive_and_multiline() {
        let r = rule("Total_Summary", r"^total\s*([\d.]+)$", Coercion::Number);
        assert_eq!(
            r.apply("Items\nTOTAL 12.50\nThanks"),
            FieldValue::Number(Decimal::from_str("12.50").unwrap())
        );
    }

    #[test]
    fn test_scrub_removes_artifacts() {
        let spec = RuleSpec::new("Company_Name", r"^([^\n]*COMPANY[^\n]*)", Coercion::Text)
            .with_scrub(&["% whistle", "=", "\""]);
        let r = FieldRule::compile(&spec).unwrap();
        assert_eq!(
            r.apply("= BREAD \"BASKET\" COMPANY % whistle\n"),
            FieldValue::Text("BREAD BASKET COMPANY".to_string())
        );
    }

    #[test]
    fn test_text_collapses_whitespace() {
        let r = rule("Company_Address_Contact", r"Addr:(.+?)End", Coercion::Text);
        assert_eq!(
            r.apply("Addr: 12 Main St\n  Amman  \nEnd"),
            FieldValue::Text("12 Main St Amman".to_string())
        );
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let err = FieldRule::compile(&RuleSpec::new("Date", r"Date:(\d+", Coercion::Date));
        assert!(matches!(err, Err(ConfigError::Pattern { .. })));
    }

    #[test]
    fn test_unknown_label_is_config_error() {
        let err = FieldRule::compile(&RuleSpec::new("Shoe_Size", r"(\d+)", Coercion::Integer));
        assert!(matches!(err, Err(ConfigError::UnknownField(_))));
    }

    #[test]
    fn test_missing_group_is_config_error() {
        let mut spec = RuleSpec::new("Date", r"Date:(\d+)", Coercion::Date);
        spec.group = 2;
        assert!(matches!(
            FieldRule::compile(&spec),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_rule_spec_from_json() {
        let spec: RuleSpec = serde_json::from_str(
            r#"{"label": "Note", "pattern": "Remark:\\s*(\\d+)", "coerce": "integer"}"#,
        )
        .unwrap();
        assert_eq!(spec.group, 1);
        assert_eq!(spec.coerce, Coercion::Integer);
        let r = FieldRule::compile(&spec).unwrap();
        assert_eq!(r.apply("remark: 42"), FieldValue::Text("42".to_string()));
    }
}
