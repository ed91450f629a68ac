//! Edge case tests for stow-engine
//!
//! These tests cover ordering laws and unusual histories and inputs.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::cmp::Ordering;
use stow_engine::{
    compare, latest_of, migrate, Error, FieldDef, FieldType, FnValidator, ObjectSchema,
    SchemaHistory, SchemaHistoryEntry, Version,
};

// ============================================================================
// Version Ordering Properties
// ============================================================================

fn identifier() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u64..20).prop_map(|n| n.to_string()),
        "[a-z][a-z0-9-]{0,5}",
    ]
}

fn version_string() -> impl Strategy<Value = String> {
    (
        0u64..4,
        0u64..4,
        0u64..4,
        proptest::collection::vec(identifier(), 0..3),
        proptest::option::of("[a-z0-9]{1,4}"),
    )
        .prop_map(|(major, minor, patch, pre, build)| {
            let mut text = format!("{}.{}.{}", major, minor, patch);
            if !pre.is_empty() {
                text.push('-');
                text.push_str(&pre.join("."));
            }
            if let Some(build) = build {
                text.push('+');
                text.push_str(&build);
            }
            text
        })
}

proptest! {
    #[test]
    fn compare_is_reflexive(a in version_string()) {
        prop_assert_eq!(compare(&a, &a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn compare_is_antisymmetric(a in version_string(), b in version_string()) {
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();
        prop_assert_eq!(ab, ba.reverse());
    }

    #[test]
    fn compare_is_transitive(
        a in version_string(),
        b in version_string(),
        c in version_string(),
    ) {
        let mut sorted = [a, b, c];
        sorted.sort_by(|x, y| compare(x, y).unwrap());
        prop_assert_ne!(compare(&sorted[0], &sorted[1]).unwrap(), Ordering::Greater);
        prop_assert_ne!(compare(&sorted[1], &sorted[2]).unwrap(), Ordering::Greater);
        prop_assert_ne!(compare(&sorted[0], &sorted[2]).unwrap(), Ordering::Greater);
    }

    #[test]
    fn latest_of_is_maximum(versions in proptest::collection::vec(version_string(), 1..8)) {
        let parsed: Vec<Version> = versions.iter().map(|v| Version::parse(v).unwrap()).collect();
        let latest = latest_of(&parsed);
        for version in &parsed {
            prop_assert_ne!(version.cmp(&latest), Ordering::Greater);
        }
        prop_assert!(parsed.contains(&latest));
    }

    #[test]
    fn malformed_operand_is_an_error(a in version_string(), junk in "[a-z]{1,8}") {
        let is_invalid = |result: Result<Ordering, Error>| {
            matches!(result, Err(Error::InvalidVersion { .. }))
        };
        prop_assert!(is_invalid(compare(&a, &junk)));
        prop_assert!(is_invalid(compare(&junk, &a)));
    }
}

#[test]
fn zero_sentinel_is_lowest_release() {
    let zero = latest_of(std::iter::empty());
    assert_eq!(zero.to_string(), "0.0.0");
    assert_eq!(compare("0.0.0", "0.0.1").unwrap(), Ordering::Less);
    // Pre-releases of 0.0.0 still rank below the sentinel
    assert_eq!(compare("0.0.0-alpha", "0.0.0").unwrap(), Ordering::Less);
}

// ============================================================================
// History Edge Cases
// ============================================================================

fn foo(field_type: FieldType) -> ObjectSchema {
    ObjectSchema::new(vec![FieldDef::required("foo", field_type)])
}

#[test]
fn single_version_history() {
    let history = SchemaHistory::builder()
        .version("1.0.0", SchemaHistoryEntry::new(foo(FieldType::String)))
        .build()
        .unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history.latest_version().as_str(), "1.0.0");
    assert_eq!(
        migrate(&history, &json!({"foo": "x"})),
        Err(Error::NoUpgradeAvailable("1.0.0".into()))
    );
    assert_eq!(migrate(&history, &json!({})), Err(Error::NoMatchingSchema));
}

#[test]
fn prerelease_versions_in_history() {
    let history = SchemaHistory::builder()
        .version("1.0.0", SchemaHistoryEntry::new(foo(FieldType::Int)))
        .version(
            "1.0.0-rc.1",
            SchemaHistoryEntry::new(foo(FieldType::String)).with_upgrade(|_| json!({"foo": 1})),
        )
        .build()
        .unwrap();

    assert_eq!(history.latest_version().as_str(), "1.0.0");
    assert_eq!(migrate(&history, &json!({"foo": "x"})).unwrap(), json!({"foo": 1}));
}

#[test]
fn null_and_scalar_raw_values() {
    let history = SchemaHistory::builder()
        .version(
            "1.0.0",
            SchemaHistoryEntry::new(FnValidator::new(|value: &Value| {
                if value.is_number() {
                    Ok(value.clone())
                } else {
                    Err(Error::InvalidPayload("expected a number".into()))
                }
            }))
            .with_upgrade(|old| json!({"foo": old})),
        )
        .version("2.0.0", SchemaHistoryEntry::new(foo(FieldType::Int)))
        .build()
        .unwrap();

    assert_eq!(migrate(&history, &json!(7)).unwrap(), json!({"foo": 7}));
    assert_eq!(migrate(&history, &Value::Null), Err(Error::NoMatchingSchema));
}

#[test]
fn deeply_nested_values_pass_through_upgrade() {
    let history = SchemaHistory::builder()
        .version(
            "1.0.0",
            SchemaHistoryEntry::new(foo(FieldType::Object))
                .with_upgrade(|old| json!({"foo": [old["foo"].clone()]})),
        )
        .version("2.0.0", SchemaHistoryEntry::new(foo(FieldType::Array)))
        .build()
        .unwrap();

    let raw = json!({"foo": {"a": {"b": {"c": [1, 2, {"d": null}]}}}});
    assert_eq!(
        migrate(&history, &raw).unwrap(),
        json!({"foo": [{"a": {"b": {"c": [1, 2, {"d": null}]}}}]})
    );
}

#[test]
fn many_versions_choose_newest_match() {
    let mut builder = SchemaHistory::builder();
    for minor in 0..50u64 {
        builder = builder.version(
            format!("1.{}.0", minor),
            SchemaHistoryEntry::new(foo(FieldType::String))
                .with_upgrade(move |_| json!({"foo": minor})),
        );
    }
    let history = builder
        .version("2.0.0", SchemaHistoryEntry::new(foo(FieldType::Int)))
        .build()
        .unwrap();

    assert_eq!(history.len(), 51);
    assert_eq!(migrate(&history, &json!({"foo": "x"})).unwrap(), json!({"foo": 49}));
}
