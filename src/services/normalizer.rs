//! Maps raw dataset elements into canonical records.
//!
//! The upstream API has shipped two response shapes over time: a flat
//! field map per element, and an envelope that nests the field map under
//! `record.fields`. Both are accepted here. Identity comes from the
//! `original_order` field, rendered as a string.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{NewSharkAttack, SharkAttackFields};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("source record has no original_order field")]
    MissingIdentity,
    #[error("source record is not an object in any supported shape")]
    UnsupportedShape,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttackRecord {
    // Envelope must be tried first: the flat variant accepts any object.
    Envelope { record: RawEnvelopeBody },
    Flat(serde_json::Map<String, Value>),
}

#[derive(Deserialize)]
struct RawEnvelopeBody {
    fields: serde_json::Map<String, Value>,
}

/// Normalize one raw dataset element into an upsertable record.
///
/// Missing descriptive fields become `None`; a missing `original_order`
/// fails this record only, so the caller can keep processing the rest
/// of the page.
pub fn normalize(raw: &Value, organization_id: &str) -> Result<NewSharkAttack, NormalizeError> {
    let parsed: RawAttackRecord =
        serde_json::from_value(raw.clone()).map_err(|_| NormalizeError::UnsupportedShape)?;
    let fields = match parsed {
        RawAttackRecord::Envelope { record } => record.fields,
        RawAttackRecord::Flat(fields) => fields,
    };

    let id = field_string(&fields, "original_order").ok_or(NormalizeError::MissingIdentity)?;

    Ok(NewSharkAttack {
        id,
        organization_id: organization_id.to_string(),
        active: true,
        fields: SharkAttackFields {
            date: field_string(&fields, "date"),
            year: field_string(&fields, "year"),
            r#type: field_string(&fields, "type"),
            country: field_string(&fields, "country"),
            area: field_string(&fields, "area"),
            location: field_string(&fields, "location"),
            activity: field_string(&fields, "activity"),
            name: field_string(&fields, "name"),
            sex: field_string(&fields, "sex"),
            age: field_string(&fields, "age"),
            injury: field_string(&fields, "injury"),
            fatal_y_n: field_string(&fields, "fatal_y_n"),
            time: field_string(&fields, "time"),
            species: field_string(&fields, "species"),
            investigator_or_source: field_string(&fields, "investigator_or_source"),
            pdf: field_string(&fields, "pdf"),
            href_formula: field_string(&fields, "href_formula"),
            href: field_string(&fields, "href"),
            case_number: field_string(&fields, "case_number"),
            case_number0: field_string(&fields, "case_number0"),
            description: None,
        },
    })
}

/// Render a field as a string. The dataset is inconsistent about numeric
/// fields (`year`, `original_order` arrive as numbers or strings), so
/// both are accepted; integers print without a fractional part.
fn field_string(fields: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    }
}
