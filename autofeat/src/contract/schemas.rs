//! Per-stage reply schemas and their validation predicates.
//!
//! Each stage defines the exact keys its backend reply must carry;
//! serde handles presence and types, the predicate handles the rest
//! (minimum collection sizes, non-empty text).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reply contract for the Summarize stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummarizeReply {
    /// Free-text summary of the manuscript.
    pub manuscript_summary: String,
    /// Column name to physical-meaning mapping.
    pub column_key: BTreeMap<String, String>,
    /// Additional context the backend chose to relay.
    #[serde(default)]
    pub notes: String,
}

impl SummarizeReply {
    /// The summary must be non-empty and the column key must describe
    /// more than one column.
    pub fn validate(&self) -> Result<(), String> {
        if self.manuscript_summary.trim().is_empty() {
            return Err("manuscript_summary is empty".to_string());
        }
        if self.column_key.len() <= 1 {
            return Err(format!(
                "column_key has {} entries, expected more than 1",
                self.column_key.len()
            ));
        }
        Ok(())
    }
}

/// Reply contract for the Propose stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposeReply {
    /// New-feature-name to physical-meaning mapping.
    #[serde(default)]
    pub new_feature_significance: BTreeMap<String, String>,
    /// New-feature-name to derivation-text mapping.
    pub new_feature_computation: BTreeMap<String, String>,
}

impl ProposeReply {
    /// At least one computation must be proposed.
    pub fn validate(&self) -> Result<(), String> {
        if self.new_feature_computation.is_empty() {
            return Err("new_feature_computation is empty".to_string());
        }
        Ok(())
    }
}

/// Reply contract for the secondary formula-resolution call inside the
/// feature compiler. Whether the formula parses against the current
/// columns is checked by the resolver, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormulaReply {
    /// An expression in the constrained grammar.
    pub formula: String,
}

impl FormulaReply {
    /// The formula text must be non-empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.formula.trim().is_empty() {
            return Err("formula is empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_reply_requires_multiple_columns() {
        let mut reply = SummarizeReply {
            manuscript_summary: "A study of alloys.".to_string(),
            column_key: BTreeMap::from([(
                "A".to_string(),
                "first input".to_string(),
            )]),
            notes: String::new(),
        };
        assert!(reply.validate().is_err());

        reply
            .column_key
            .insert("B".to_string(), "second input".to_string());
        assert!(reply.validate().is_ok());
    }

    #[test]
    fn summarize_reply_rejects_blank_summary() {
        let reply = SummarizeReply {
            manuscript_summary: "   ".to_string(),
            column_key: BTreeMap::from([
                ("A".to_string(), "x".to_string()),
                ("B".to_string(), "y".to_string()),
            ]),
            notes: String::new(),
        };
        assert!(reply.validate().is_err());
    }

    #[test]
    fn propose_reply_requires_computations() {
        let empty = ProposeReply {
            new_feature_significance: BTreeMap::new(),
            new_feature_computation: BTreeMap::new(),
        };
        assert!(empty.validate().is_err());

        let ok = ProposeReply {
            new_feature_significance: BTreeMap::new(),
            new_feature_computation: BTreeMap::from([(
                "sum_ab".to_string(),
                "sum of A and B".to_string(),
            )]),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn propose_reply_parses_without_significance_key() {
        let parsed: ProposeReply = serde_json::from_str(
            r#"{"new_feature_computation": {"r": "ratio of A to B"}}"#,
        )
        .unwrap();
        assert!(parsed.validate().is_ok());
        assert!(parsed.new_feature_significance.is_empty());
    }

    #[test]
    fn formula_reply_rejects_blank() {
        let reply = FormulaReply {
            formula: " ".to_string(),
        };
        assert!(reply.validate().is_err());
    }
}
