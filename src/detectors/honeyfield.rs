//! Honeyfield detector.
//!
//! A honeyfield is a form input hidden from humans. Any value in it means the
//! form was filled in by something that reads the markup, not the page.

use crate::signal::{RiskSignal, Severity, SignalKind};
use regex::Regex;
use serde::Serialize;
use serde_json::json;

/// A filled-in honeyfield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoneyfieldHit {
    pub field: String,
    pub value: String,
}

impl HoneyfieldHit {
    pub fn to_signal(&self) -> RiskSignal {
        RiskSignal::new(
            SignalKind::Honeyfield,
            Severity::High,
            json!({ "field": self.field, "value": self.value }),
        )
    }
}

/// Finds filled honeyfields by matching field names against a pattern.
#[derive(Debug, Clone)]
pub struct HoneyfieldDetector {
    pattern: Regex,
}

impl HoneyfieldDetector {
    /// Create a detector from a field-name regex.
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Return the first honeyfield with a non-blank value.
    pub fn check<'a, I>(&self, fields: I) -> Option<HoneyfieldHit>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        fields
            .into_iter()
            .find(|(name, value)| self.pattern.is_match(name) && !value.trim().is_empty())
            .map(|(name, value)| HoneyfieldHit {
                field: name.to_string(),
                value: value.to_string(),
            })
    }

    /// Check a JSON object of form fields. Non-string values are stringified;
    /// null counts as empty.
    pub fn check_json(&self, form: &serde_json::Map<String, serde_json::Value>) -> Option<HoneyfieldHit> {
        let fields: Vec<(&str, String)> = form
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (name.as_str(), value)
            })
            .collect();

        self.check(fields.iter().map(|(name, value)| (*name, value.as_str())))
    }
}
