// Tests for dataset record normalization:
// - both upstream response shapes (flat map, record.fields envelope)
// - identity from original_order, numeric or string
// - sparse fields mapping to None instead of failing the record

mod test_helpers;

use serde_json::json;
use shark_attack_api::services::normalizer::{normalize, NormalizeError};
use test_helpers::*;

#[test]
fn test_normalize_flat_shape() {
    let raw = flat_record(42, "AUSTRALIA");

    let record = normalize(&raw, TEST_ORG).expect("flat record should normalize");

    assert_eq!(record.id, "42");
    assert_eq!(record.organization_id, TEST_ORG);
    assert!(record.active);
    assert_eq!(record.fields.country.as_deref(), Some("AUSTRALIA"));
    assert_eq!(record.fields.year.as_deref(), Some("2023"));
    assert_eq!(record.fields.activity.as_deref(), Some("Surfing"));
    assert_eq!(record.fields.species.as_deref(), Some("Tiger shark"));
}

#[test]
fn test_normalize_envelope_shape() {
    let raw = envelope_record(42, "USA");

    let record = normalize(&raw, TEST_ORG).expect("envelope record should normalize");

    // Same identity as the flat shape carrying the same original_order.
    assert_eq!(record.id, "42");
    assert_eq!(record.fields.country.as_deref(), Some("USA"));
    assert_eq!(record.fields.injury.as_deref(), Some("Minor injury to leg"));
}

#[test]
fn test_numeric_identity_renders_without_fraction() {
    let raw = json!({ "original_order": 6301, "country": "BAHAMAS" });

    let record = normalize(&raw, TEST_ORG).expect("should normalize");

    assert_eq!(record.id, "6301");
}

#[test]
fn test_non_integer_numbers_keep_their_representation() {
    let raw = json!({ "original_order": "1", "age": 17.5 });

    let record = normalize(&raw, TEST_ORG).expect("should normalize");

    assert_eq!(record.fields.age.as_deref(), Some("17.5"));
}

#[test]
fn test_missing_fields_become_none() {
    let raw = json!({ "original_order": "9" });

    let record = normalize(&raw, TEST_ORG).expect("sparse record should normalize");

    assert_eq!(record.fields.country, None);
    assert_eq!(record.fields.date, None);
    assert_eq!(record.fields.species, None);
    assert_eq!(record.fields.injury, None);
}

#[test]
fn test_null_fields_become_none() {
    let raw = json!({ "original_order": "9", "country": null, "year": null });

    let record = normalize(&raw, TEST_ORG).expect("should normalize");

    assert_eq!(record.fields.country, None);
    assert_eq!(record.fields.year, None);
}

#[test]
fn test_description_is_never_sourced_from_the_dataset() {
    let raw = json!({ "original_order": "3", "description": "should be ignored" });

    let record = normalize(&raw, TEST_ORG).expect("should normalize");

    assert_eq!(record.fields.description, None);
}

#[test]
fn test_missing_identity_fails_the_record() {
    let raw = json!({ "country": "AUSTRALIA", "year": "2023" });

    let err = normalize(&raw, TEST_ORG).expect_err("no original_order should fail");

    assert!(matches!(err, NormalizeError::MissingIdentity));
}

#[test]
fn test_null_identity_fails_the_record() {
    let raw = json!({ "original_order": null, "country": "AUSTRALIA" });

    let err = normalize(&raw, TEST_ORG).expect_err("null original_order should fail");

    assert!(matches!(err, NormalizeError::MissingIdentity));
}

#[test]
fn test_non_object_element_is_unsupported() {
    let err = normalize(&json!(["not", "an", "object"]), TEST_ORG)
        .expect_err("array should be rejected");

    assert!(matches!(err, NormalizeError::UnsupportedShape));
}

#[test]
fn test_envelope_is_preferred_over_flat_reading() {
    // An envelope element also parses as a flat map, so the nested fields
    // must win over treating "record" as a descriptive field.
    let raw = json!({
        "record": {
            "fields": { "original_order": "12", "country": "BRAZIL" }
        }
    });

    let record = normalize(&raw, TEST_ORG).expect("should normalize");

    assert_eq!(record.id, "12");
    assert_eq!(record.fields.country.as_deref(), Some("BRAZIL"));
}
