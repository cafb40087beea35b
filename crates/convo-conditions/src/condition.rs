//! Condition types
//!
//! Conditions are per-message tests evaluated against the live context each
//! time the walker reaches the message. They are never memoized across a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Condition definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Strict equality against one context variable
    Equals(EqualsCondition),

    /// Membership test against one context variable
    Contains(ContainsCondition),

    /// Sequence length must be at least the given value
    LengthAtLeast(LengthCondition),

    /// Sequence length must be at most the given value
    LengthAtMost(LengthCondition),

    /// Sequence length must equal the given value
    LengthEquals(LengthCondition),

    /// Condition must be false (NOT)
    Not(NotCondition),

    /// All conditions must be true (AND)
    And(AndCondition),

    /// Any condition must be true (OR)
    Or(OrCondition),
}

impl Condition {
    /// Create an equality condition
    pub fn equals(variable: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Equals(EqualsCondition {
            variable: variable.into(),
            value: value.into(),
        })
    }

    /// Create a membership condition
    pub fn contains(variable: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Contains(ContainsCondition {
            variable: variable.into(),
            value: value.into(),
        })
    }

    /// Create a minimum-length condition
    pub fn length_at_least(variable: impl Into<String>, value: usize) -> Self {
        Condition::LengthAtLeast(LengthCondition {
            variable: variable.into(),
            value,
        })
    }

    /// Create a maximum-length condition
    pub fn length_at_most(variable: impl Into<String>, value: usize) -> Self {
        Condition::LengthAtMost(LengthCondition {
            variable: variable.into(),
            value,
        })
    }

    /// Create an exact-length condition
    pub fn length_equals(variable: impl Into<String>, value: usize) -> Self {
        Condition::LengthEquals(LengthCondition {
            variable: variable.into(),
            value,
        })
    }

    /// Create a NOT condition
    pub fn not(condition: Condition) -> Self {
        Condition::Not(NotCondition {
            condition: Box::new(condition),
        })
    }

    /// Create an AND condition
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(AndCondition { conditions })
    }

    /// Create an OR condition
    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(OrCondition { conditions })
    }
}

/// Equality condition - strict `Value` equality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualsCondition {
    /// Context variable to read
    pub variable: String,

    /// Value to compare against; an absent variable compares as `null`
    pub value: Value,
}

/// Membership condition
///
/// Strings test for a substring (the value must be a string); arrays test
/// for an equal element. Anything else fails the test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainsCondition {
    /// Context variable to read
    pub variable: String,

    /// Value that must be contained
    pub value: Value,
}

/// Sequence length condition
///
/// Satisfied only when the variable holds an array; non-sequences are a
/// plain `false`, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthCondition {
    /// Context variable to read
    pub variable: String,

    /// Length to compare against
    pub value: usize,
}

/// Negation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotCondition {
    /// Condition to negate
    pub condition: Box<Condition>,
}

/// Conjunction; empty lists are vacuously true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndCondition {
    pub conditions: Vec<Condition>,
}

/// Disjunction; empty lists are false
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrCondition {
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serde_tagging() {
        let cond = Condition::equals("is_admin", "Yes");
        let value = serde_json::to_value(&cond).unwrap();
        assert_eq!(
            value,
            json!({"type": "equals", "variable": "is_admin", "value": "Yes"})
        );

        let parsed: Condition = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, cond);
    }

    #[test]
    fn test_nested_round_trip() {
        let cond = Condition::and(vec![
            Condition::not(Condition::equals("name", Value::Null)),
            Condition::or(vec![
                Condition::contains("tags", "vip"),
                Condition::length_at_least("orders", 3),
            ]),
        ]);

        let text = serde_json::to_string(&cond).unwrap();
        let parsed: Condition = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, cond);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result: Result<Condition, _> = serde_json::from_value(json!({
            "type": "greater_than",
            "variable": "age",
            "value": 18
        }));
        assert!(result.is_err());
    }
}
