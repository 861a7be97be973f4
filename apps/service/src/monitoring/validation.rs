//! Schema validation for stored check documents.
//!
//! The scheduler reads checks as untyped JSON. This module turns one
//! document into a well-typed [`Check`] or a [`CheckRejection`] naming the
//! first field at fault, so malformed records are skipped uniformly.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Check, CheckState, HttpMethod, Protocol};
use crate::validation::{
    dedup_codes, validate_phone, validate_record_id, validate_success_codes, validate_target,
    validate_timeout,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckRejection {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("field '{field}' is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("record id '{found}' does not match its key '{expected}'")]
    IdMismatch { expected: String, found: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> CheckRejection {
    CheckRejection::Invalid { field, reason: reason.into() }
}

fn required_str<'a>(
    record: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, CheckRejection> {
    match record.get(field) {
        None | Some(Value::Null) => Err(CheckRejection::Missing(field)),
        Some(Value::String(s)) => Ok(s.trim()),
        Some(_) => Err(invalid(field, "expected a string")),
    }
}

/// Validate the document stored under `key` and build a [`Check`]
pub fn parse_check(key: &str, raw: &Value) -> Result<Check, CheckRejection> {
    let record = raw.as_object().ok_or(CheckRejection::NotAnObject)?;

    let id = required_str(record, "id")?;
    validate_record_id(id).into_result().map_err(|e| invalid("id", e))?;
    if id != key {
        return Err(CheckRejection::IdMismatch { expected: key.to_string(), found: id.to_string() });
    }

    let user_phone = required_str(record, "userPhone")?;
    validate_phone(user_phone).into_result().map_err(|e| invalid("userPhone", e))?;

    let protocol: Protocol =
        required_str(record, "protocol")?.parse().map_err(|e: String| invalid("protocol", e))?;

    let url = required_str(record, "url")?;
    validate_target(protocol, url).into_result().map_err(|e| invalid("url", e))?;

    let method: HttpMethod =
        required_str(record, "method")?.parse().map_err(|e: String| invalid("method", e))?;

    let success_codes = parse_success_codes(record)?;

    let timeout_seconds = match record.get("timeoutSeconds") {
        None | Some(Value::Null) => return Err(CheckRejection::Missing("timeoutSeconds")),
        Some(value) => value.as_u64().ok_or_else(|| invalid("timeoutSeconds", "expected a whole number"))?,
    };
    validate_timeout(timeout_seconds).into_result().map_err(|e| invalid("timeoutSeconds", e))?;

    // Checks written before their first probe carry no state
    let state = match record.get("state") {
        None | Some(Value::Null) => CheckState::Unknown,
        Some(Value::String(s)) => s.parse().map_err(|e: String| invalid("state", e))?,
        Some(_) => return Err(invalid("state", "expected a string")),
    };

    let last_checked = match record.get("lastChecked") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_i64()
                .filter(|ms| *ms >= 0)
                .ok_or_else(|| invalid("lastChecked", "expected a non-negative timestamp"))?,
        ),
    };

    Ok(Check {
        id: id.to_string(),
        user_phone: user_phone.to_string(),
        protocol,
        url: url.to_string(),
        method,
        success_codes,
        timeout_seconds,
        state,
        last_checked,
    })
}

fn parse_success_codes(record: &Map<String, Value>) -> Result<Vec<u16>, CheckRejection> {
    let values = match record.get("successCodes") {
        None | Some(Value::Null) => return Err(CheckRejection::Missing("successCodes")),
        Some(Value::Array(values)) => values,
        Some(_) => return Err(invalid("successCodes", "expected an array")),
    };

    let codes = values
        .iter()
        .map(|v| v.as_u64().and_then(|c| u16::try_from(c).ok()))
        .collect::<Option<Vec<u16>>>()
        .ok_or_else(|| invalid("successCodes", "expected status code numbers"))?;

    validate_success_codes(&codes).into_result().map_err(|e| invalid("successCodes", e))?;
    Ok(dedup_codes(&codes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: &str = "abcdefghij0123456789";

    fn document() -> Value {
        json!({
            "id": ID,
            "userPhone": "5551234567",
            "protocol": "https",
            "url": "example.com",
            "method": "get",
            "successCodes": [200, 201, 200],
            "timeoutSeconds": 3,
            "state": "up",
            "lastChecked": 1_700_000_000_000i64
        })
    }

    fn without(field: &str) -> Value {
        let mut doc = document();
        doc.as_object_mut().unwrap().remove(field);
        doc
    }

    fn with(field: &str, value: Value) -> Value {
        let mut doc = document();
        doc[field] = value;
        doc
    }

    #[test]
    fn test_valid_document() {
        let check = parse_check(ID, &document()).unwrap();
        assert_eq!(check.protocol, Protocol::Https);
        assert_eq!(check.method, HttpMethod::Get);
        assert_eq!(check.success_codes, vec![200, 201]);
        assert_eq!(check.state, CheckState::Up);
        assert_eq!(check.last_checked, Some(1_700_000_000_000));
    }

    #[test]
    fn test_missing_state_is_unknown() {
        let check = parse_check(ID, &without("state")).unwrap();
        assert_eq!(check.state, CheckState::Unknown);
        assert!(parse_check(ID, &without("lastChecked")).unwrap().last_checked.is_none());
    }

    #[test]
    fn test_missing_required_fields() {
        for field in ["id", "userPhone", "protocol", "url", "method", "successCodes", "timeoutSeconds"] {
            assert_eq!(
                parse_check(ID, &without(field)),
                Err(CheckRejection::Missing(field)),
                "field {field}"
            );
        }
    }

    #[test]
    fn test_out_of_range_values() {
        let cases = [
            ("timeoutSeconds", json!(0)),
            ("timeoutSeconds", json!(6)),
            ("timeoutSeconds", json!("3")),
            ("successCodes", json!([])),
            ("successCodes", json!([200, 70000])),
            ("successCodes", json!("200")),
            ("protocol", json!("ftp")),
            ("method", json!("patch")),
            ("url", json!("")),
            ("userPhone", json!("123")),
            ("state", json!("sideways")),
            ("lastChecked", json!(-5)),
        ];

        for (field, value) in cases {
            let err = parse_check(ID, &with(field, value.clone())).unwrap_err();
            assert!(
                matches!(err, CheckRejection::Invalid { field: f, .. } if f == field),
                "{field}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_id_must_match_key() {
        let err = parse_check("zzzzzzzzzzzzzzzzzzzz", &document()).unwrap_err();
        assert!(matches!(err, CheckRejection::IdMismatch { .. }));
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(parse_check(ID, &json!([1, 2])), Err(CheckRejection::NotAnObject));
    }
}
