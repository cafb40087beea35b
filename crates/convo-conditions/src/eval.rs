//! Condition evaluation logic
//!
//! Pure recursive evaluation of a [`Condition`] tree against a context.
//! Evaluation has no side effects and always reads the context as it stands
//! at call time.

use convo_core::Context;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::condition::Condition;

/// Maximum nesting depth accepted by the evaluator
///
/// Condition trees are constructed, not user-supplied at runtime, so the
/// guard exists to turn a pathological tree into a descriptive error
/// instead of a stack overflow.
pub const MAX_DEPTH: usize = 64;

/// Condition evaluation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("condition tree exceeds maximum nesting depth of {limit}")]
    DepthLimitExceeded { limit: usize },
}

/// Result type for condition evaluation
pub type ConditionResult<T> = Result<T, ConditionError>;

/// Evaluate a condition against a context
///
/// Returns `true` if the condition is satisfied, `false` otherwise.
/// `and`/`or` short-circuit; leaves read the context at call time.
pub fn evaluate(condition: &Condition, context: &Context) -> ConditionResult<bool> {
    let result = eval_at(condition, context, 0)?;
    trace!(?condition, result, "Evaluated condition");
    Ok(result)
}

/// Evaluate a list of conditions as a conjunction
///
/// An empty list is vacuously true.
pub fn evaluate_all(conditions: &[Condition], context: &Context) -> ConditionResult<bool> {
    for condition in conditions {
        if !evaluate(condition, context)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluate a list of conditions as a disjunction
///
/// An empty list is false.
pub fn evaluate_any(conditions: &[Condition], context: &Context) -> ConditionResult<bool> {
    for condition in conditions {
        if evaluate(condition, context)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn eval_at(condition: &Condition, context: &Context, depth: usize) -> ConditionResult<bool> {
    if depth >= MAX_DEPTH {
        return Err(ConditionError::DepthLimitExceeded { limit: MAX_DEPTH });
    }

    match condition {
        Condition::Equals(c) => {
            // An absent variable reads as null, so `equals(v, null)` tests absence.
            let actual = context.get(&c.variable).unwrap_or(&Value::Null);
            Ok(*actual == c.value)
        }

        Condition::Contains(c) => Ok(eval_contains(context.get(&c.variable), &c.value)),

        Condition::LengthAtLeast(c) => {
            Ok(sequence_len(context.get(&c.variable)).is_some_and(|len| len >= c.value))
        }

        Condition::LengthAtMost(c) => {
            Ok(sequence_len(context.get(&c.variable)).is_some_and(|len| len <= c.value))
        }

        Condition::LengthEquals(c) => {
            Ok(sequence_len(context.get(&c.variable)).is_some_and(|len| len == c.value))
        }

        Condition::Not(c) => Ok(!eval_at(&c.condition, context, depth + 1)?),

        Condition::And(c) => {
            for sub in &c.conditions {
                if !eval_at(sub, context, depth + 1)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Condition::Or(c) => {
            for sub in &c.conditions {
                if eval_at(sub, context, depth + 1)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn eval_contains(actual: Option<&Value>, needle: &Value) -> bool {
    match actual {
        Some(Value::String(haystack)) => match needle {
            Value::String(part) => haystack.contains(part.as_str()),
            _ => false,
        },
        Some(Value::Array(items)) => items.iter().any(|item| item == needle),
        _ => false,
    }
}

fn sequence_len(value: Option<&Value>) -> Option<usize> {
    match value {
        Some(Value::Array(items)) => Some(items.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_context() -> Context {
        let mut ctx = Context::new();
        ctx.set("variable1", json!("value1"));
        ctx.set("variable2", json!("value2"));
        ctx.set("tags", json!(["vip", "beta"]));
        ctx
    }

    #[test]
    fn test_equals() {
        let ctx = sample_context();
        assert!(evaluate(&Condition::equals("variable1", "value1"), &ctx).unwrap());
        assert!(!evaluate(&Condition::equals("variable1", "value2"), &ctx).unwrap());
    }

    #[test]
    fn test_equals_missing_variable() {
        let ctx = Context::new();
        assert!(!evaluate(&Condition::equals("absent", "anything"), &ctx).unwrap());
        assert!(evaluate(&Condition::equals("absent", json!(null)), &ctx).unwrap());
    }

    #[test]
    fn test_contains_string() {
        let ctx = sample_context();
        assert!(evaluate(&Condition::contains("variable2", "val"), &ctx).unwrap());
        assert!(!evaluate(&Condition::contains("variable2", "value4"), &ctx).unwrap());
    }

    #[test]
    fn test_contains_array() {
        let ctx = sample_context();
        assert!(evaluate(&Condition::contains("tags", "vip"), &ctx).unwrap());
        assert!(!evaluate(&Condition::contains("tags", "admin"), &ctx).unwrap());
    }

    #[test]
    fn test_contains_non_container() {
        let mut ctx = Context::new();
        ctx.set("n", json!(42));
        assert!(!evaluate(&Condition::contains("n", "4"), &ctx).unwrap());
        assert!(!evaluate(&Condition::contains("absent", "x"), &ctx).unwrap());
    }

    #[test]
    fn test_length_predicates() {
        let ctx = sample_context();
        assert!(evaluate(&Condition::length_at_least("tags", 2), &ctx).unwrap());
        assert!(!evaluate(&Condition::length_at_least("tags", 3), &ctx).unwrap());
        assert!(evaluate(&Condition::length_at_most("tags", 2), &ctx).unwrap());
        assert!(!evaluate(&Condition::length_at_most("tags", 1), &ctx).unwrap());
        assert!(evaluate(&Condition::length_equals("tags", 2), &ctx).unwrap());
        assert!(!evaluate(&Condition::length_equals("tags", 1), &ctx).unwrap());
    }

    #[test]
    fn test_length_on_non_sequence_is_false() {
        let ctx = sample_context();
        // variable1 is a string, not a sequence
        assert!(!evaluate(&Condition::length_at_least("variable1", 0), &ctx).unwrap());
        assert!(!evaluate(&Condition::length_at_most("variable1", 100), &ctx).unwrap());
        assert!(!evaluate(&Condition::length_equals("absent", 0), &ctx).unwrap());
    }

    #[test]
    fn test_not_negates() {
        let ctx = sample_context();
        for cond in [
            Condition::equals("variable1", "value1"),
            Condition::equals("variable1", "nope"),
            Condition::contains("tags", "vip"),
            Condition::length_equals("tags", 7),
        ] {
            let plain = evaluate(&cond, &ctx).unwrap();
            let negated = evaluate(&Condition::not(cond), &ctx).unwrap();
            assert_eq!(negated, !plain);
        }
    }

    #[test]
    fn test_and_matches_iterator_all() {
        let ctx = sample_context();
        let subs = vec![
            Condition::equals("variable1", "value1"),
            Condition::contains("variable2", "value2"),
        ];
        let expected = subs
            .iter()
            .all(|c| evaluate(c, &ctx).unwrap());
        assert_eq!(evaluate(&Condition::and(subs), &ctx).unwrap(), expected);

        let failing = Condition::and(vec![
            Condition::equals("variable1", "value1"),
            Condition::equals("variable2", "value3"),
        ]);
        assert!(!evaluate(&failing, &ctx).unwrap());
    }

    #[test]
    fn test_or_matches_iterator_any() {
        let ctx = sample_context();
        let subs = vec![
            Condition::equals("variable1", "wrong"),
            Condition::equals("variable2", "value2"),
        ];
        let expected = subs
            .iter()
            .any(|c| evaluate(c, &ctx).unwrap());
        assert_eq!(evaluate(&Condition::or(subs), &ctx).unwrap(), expected);

        let failing = Condition::or(vec![
            Condition::equals("variable1", "wrong"),
            Condition::equals("variable2", "wrong"),
        ]);
        assert!(!evaluate(&failing, &ctx).unwrap());
    }

    #[test]
    fn test_empty_combinators() {
        let ctx = Context::new();
        assert!(evaluate(&Condition::and(vec![]), &ctx).unwrap());
        assert!(!evaluate(&Condition::or(vec![]), &ctx).unwrap());
        assert!(evaluate_all(&[], &ctx).unwrap());
        assert!(!evaluate_any(&[], &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_all_any_helpers() {
        let ctx = sample_context();
        let conds = [
            Condition::equals("variable1", "value1"),
            Condition::equals("variable2", "wrong"),
        ];
        assert!(!evaluate_all(&conds, &ctx).unwrap());
        assert!(evaluate_any(&conds, &ctx).unwrap());
    }

    #[test]
    fn test_depth_guard() {
        let ctx = Context::new();
        let mut cond = Condition::equals("x", 1);
        for _ in 0..(MAX_DEPTH + 1) {
            cond = Condition::not(cond);
        }
        assert_eq!(
            evaluate(&cond, &ctx),
            Err(ConditionError::DepthLimitExceeded { limit: MAX_DEPTH })
        );
    }
}
