//! Loose (coercive) equality used by the object-predicate queries.
//!
//! Matching follows the original system's non-strict comparison rules:
//! numbers and numeric strings compare equal, booleans coerce to 0/1, and
//! a `null` predicate value also matches a field that is absent entirely.
//! Arrays and objects compare structurally.

use serde_json::Value;

use crate::records::Account;

/// Coercive equality between two JSON values.
pub fn loosely_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        // A boolean against anything else coerces to its numeric value.
        (Value::Bool(b), other) | (other, Value::Bool(b)) => {
            loosely_eq(&Value::from(*b as i64), other)
        }
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => s
            .trim()
            .parse::<f64>()
            .map(|parsed| Some(parsed) == n.as_f64())
            .unwrap_or(false),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => false,
    }
}

/// Whether `account` satisfies every field of `predicate`.
///
/// An empty predicate matches every account. A missing field only matches
/// a `null` predicate value.
pub fn matches_predicate(account: &Account, predicate: &Account) -> bool {
    predicate
        .iter()
        .all(|(field, expected)| match account.get(field) {
            Some(actual) => loosely_eq(actual, expected),
            None => expected.is_null(),
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: serde_json::Value) -> Account {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn numbers_and_numeric_strings_compare_equal() {
        assert!(loosely_eq(&json!(7), &json!("7")));
        assert!(loosely_eq(&json!("2.5"), &json!(2.5)));
        assert!(!loosely_eq(&json!("7a"), &json!(7)));
    }

    #[test]
    fn booleans_coerce_to_numbers() {
        assert!(loosely_eq(&json!(true), &json!(1)));
        assert!(loosely_eq(&json!(false), &json!("0")));
        assert!(!loosely_eq(&json!(true), &json!(2)));
        assert!(!loosely_eq(&json!(false), &Value::Null));
    }

    #[test]
    fn null_does_not_match_other_scalars() {
        assert!(loosely_eq(&Value::Null, &Value::Null));
        assert!(!loosely_eq(&Value::Null, &json!(0)));
        assert!(!loosely_eq(&Value::Null, &json!("")));
    }

    #[test]
    fn arrays_and_objects_compare_structurally() {
        assert!(loosely_eq(&json!([1, 2]), &json!([1, 2])));
        assert!(!loosely_eq(&json!([1, 2]), &json!([2, 1])));
        assert!(loosely_eq(&json!({"a": 1}), &json!({"a": 1})));
    }

    #[test]
    fn empty_predicate_matches_everything() {
        let account = object(json!({"id": "x", "role": "admin"}));
        assert!(matches_predicate(&account, &Account::new()));
    }

    #[test]
    fn predicate_null_matches_missing_field() {
        let account = object(json!({"id": "x"}));
        let predicate = object(json!({"deleted_at": null}));
        assert!(matches_predicate(&account, &predicate));

        let predicate = object(json!({"role": "admin"}));
        assert!(!matches_predicate(&account, &predicate));
    }

    #[test]
    fn predicate_requires_every_field() {
        let account = object(json!({"role": "admin", "active": true}));
        assert!(matches_predicate(
            &account,
            &object(json!({"role": "admin", "active": 1}))
        ));
        assert!(!matches_predicate(
            &account,
            &object(json!({"role": "admin", "active": false}))
        ));
    }
}
