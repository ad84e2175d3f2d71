//! Response envelope normalization.
//!
//! The backend wraps payloads three different ways depending on the endpoint:
//! `{ "success": true, "data": ... }` (or just `{ "data": ... }`), the bare
//! payload, or a bare array. Every body is classified once here so the rest of
//! the crate only handles payload values.

use serde_json::{Map, Value};

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Wrapped {
        success: bool,
        data: Option<Value>,
        message: Option<String>,
    },
    Bare(Value),
    BareArray(Vec<Value>),
}

impl Envelope {
    pub fn classify(body: Value) -> Self {
        match body {
            Value::Array(items) => Envelope::BareArray(items),
            Value::Object(map) if is_wrapper(&map) => {
                let mut map = map;
                let success = map
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let message = map
                    .remove("message")
                    .and_then(|m| m.as_str().map(String::from));
                Envelope::Wrapped {
                    success,
                    data: map.remove("data"),
                    message,
                }
            }
            other => Envelope::Bare(other),
        }
    }

    fn payload(self) -> Result<Value, GatewayError> {
        match self {
            Envelope::Wrapped {
                success: false,
                message,
                ..
            } => Err(GatewayError::Rejected {
                message: message.unwrap_or_else(|| "request was not successful".into()),
            }),
            Envelope::Wrapped { data, .. } => Ok(data.unwrap_or(Value::Null)),
            Envelope::Bare(value) => Ok(value),
            Envelope::BareArray(items) => Ok(Value::Array(items)),
        }
    }

    /// Payload for a single-object endpoint. `null` means "nothing".
    pub fn into_single(self) -> Result<Option<Value>, GatewayError> {
        match self.payload()? {
            Value::Null => Ok(None),
            Value::Array(items) => Ok(items.into_iter().next()),
            value @ Value::Object(_) => Ok(Some(value)),
            other => Err(GatewayError::Malformed(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Payload for a collection endpoint. `null` is an empty collection.
    pub fn into_items(self) -> Result<Vec<Value>, GatewayError> {
        match self.payload()? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items),
            other => Err(GatewayError::Malformed(format!(
                "expected an array, got {}",
                kind(&other)
            ))),
        }
    }
}

/// `{success, ...}` always wraps; `{data, ...}` wraps unless it is itself a record.
fn is_wrapper(map: &Map<String, Value>) -> bool {
    if map.get("success").is_some_and(Value::is_boolean) {
        return true;
    }
    map.contains_key("data") && !map.contains_key("id") && !map.contains_key("_id")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shift() -> Value {
        json!({"id": "S1", "status": "SCHEDULED"})
    }

    #[test]
    fn three_shapes_yield_the_same_single_payload() {
        let wrapped = Envelope::classify(json!({"success": true, "data": shift()}));
        let data_only = Envelope::classify(json!({"data": shift()}));
        let bare = Envelope::classify(shift());
        let array = Envelope::classify(json!([shift()]));

        for env in [wrapped, data_only, bare, array] {
            assert_eq!(env.into_single().unwrap(), Some(shift()));
        }
    }

    #[test]
    fn three_shapes_yield_the_same_collection() {
        let items = json!([shift(), shift()]);
        let wrapped = Envelope::classify(json!({"success": true, "data": items.clone()}));
        let bare = Envelope::classify(items.clone());
        let data_only = Envelope::classify(json!({"data": items}));

        for env in [wrapped, bare, data_only] {
            assert_eq!(env.into_items().unwrap().len(), 2);
        }
    }

    #[test]
    fn unsuccessful_wrapper_is_rejected_with_message() {
        let env = Envelope::classify(json!({"success": false, "message": "Shift already started"}));
        match env.into_single() {
            Err(GatewayError::Rejected { message }) => assert_eq!(message, "Shift already started"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn record_with_data_field_is_not_a_wrapper() {
        let record = json!({"id": "S1", "data": {"extra": true}});
        assert_eq!(Envelope::classify(record.clone()), Envelope::Bare(record));
    }

    #[test]
    fn null_data_means_nothing() {
        let env = Envelope::classify(json!({"success": true, "data": null}));
        assert_eq!(env.clone().into_single().unwrap(), None);
        assert!(env.into_items().unwrap().is_empty());
    }

    #[test]
    fn object_where_collection_expected_is_malformed() {
        let env = Envelope::classify(shift());
        assert!(matches!(env.into_items(), Err(GatewayError::Malformed(_))));
    }
}
