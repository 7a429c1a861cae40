//! Body matching.
//!
//! With `exact` the observed body must equal the declared one: structurally
//! for JSON and forms, byte-for-byte for text and binary. Without it the
//! declared body must be contained in the observed one (JSON subset, form
//! entry subset, substring or byte subsequence).

use crate::request::Body;
use serde_json::Value;

/// Check a declared body against the observed body.
pub fn body_matches(declared: &Body, observed: &Body, exact: bool) -> bool {
    match (declared, observed) {
        (Body::Empty, Body::Empty) => true,
        (Body::Empty, _) | (_, Body::Empty) => false,
        (Body::Json(expected), Body::Json(actual)) => {
            if exact {
                expected == actual
            } else {
                json_contains(actual, expected)
            }
        }
        (Body::Form(expected), Body::Form(actual)) => {
            if exact {
                let mut expected = expected.clone();
                let mut actual = actual.clone();
                expected.sort();
                actual.sort();
                expected == actual
            } else {
                expected.iter().all(|entry| actual.contains(entry))
            }
        }
        (Body::Text(expected), Body::Text(actual)) => {
            if exact {
                expected == actual
            } else {
                actual.contains(expected.as_str())
            }
        }
        (Body::Text(_) | Body::Binary(_), Body::Text(_) | Body::Binary(_)) => {
            let expected = declared.to_bytes();
            let actual = observed.to_bytes();
            if exact {
                expected == actual
            } else {
                contains_subsequence(&actual, &expected)
            }
        }
        _ => false,
    }
}

/// Whether `actual` contains `expected`: objects by key subset (recursively),
/// arrays when every expected item is contained in some actual item, and
/// scalars by equality.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => {
            expected.iter().all(|(key, expected_value)| {
                actual
                    .get(key)
                    .is_some_and(|actual_value| json_contains(actual_value, expected_value))
            })
        }
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|item| actual.iter().any(|candidate| json_contains(candidate, item))),
        _ => actual == expected,
    }
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
