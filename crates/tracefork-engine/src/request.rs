//! Request body parsing
//!
//! Bodies arrive as raw JSON text. Parsing happens in two stages so the
//! caller can tell a malformed document apart from a well-formed one with
//! bad fields; the second stage reports every offending field at once.

use crate::error::{EngineError, FieldErrors};
use crate::flags::FlagUpdate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const INVALID_JSON: &str = "Invalid JSON body.";
const INVALID_REQUEST: &str = "Invalid request.";
const NON_EMPTY_STRING: &str = "must be a non-empty string";

/// Body of a fork or comparison request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeRequest {
    pub execution_id: String,
    pub node_id: String,
    pub alternative_outcome: String,
}

impl AlternativeRequest {
    #[must_use]
    pub fn new(
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
        alternative_outcome: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            node_id: node_id.into(),
            alternative_outcome: alternative_outcome.into(),
        }
    }

    /// Parse and validate a JSON body
    ///
    /// # Errors
    /// `EngineError::InvalidInput`, with per-field details when the document
    /// parsed but its fields did not validate
    pub fn from_json(body: &str) -> Result<Self, EngineError> {
        let object = parse_object(body)?;
        let mut details = FieldErrors::new();
        let mut field = |name: &str| match object.get(name) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => {
                details.insert(name.to_string(), vec![NON_EMPTY_STRING.to_string()]);
                String::new()
            }
        };
        let request = Self {
            execution_id: field("execution_id"),
            node_id: field("node_id"),
            alternative_outcome: field("alternative_outcome"),
        };
        finish(request, details)
    }

    /// Check fields of an already-typed request
    ///
    /// # Errors
    /// `EngineError::InvalidInput` listing every empty field
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut details = FieldErrors::new();
        for (name, value) in [
            ("execution_id", &self.execution_id),
            ("node_id", &self.node_id),
            ("alternative_outcome", &self.alternative_outcome),
        ] {
            if value.is_empty() {
                details.insert(name.to_string(), vec![NON_EMPTY_STRING.to_string()]);
            }
        }
        finish((), details)
    }
}

impl FlagUpdate {
    /// Parse a flag patch body; present fields must be booleans
    ///
    /// # Errors
    /// `EngineError::InvalidInput` on malformed JSON or non-boolean fields
    pub fn from_json(body: &str) -> Result<Self, EngineError> {
        let object = parse_object(body)?;
        let mut details = FieldErrors::new();
        let mut field = |name: &str| match object.get(name) {
            None => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                details.insert(name.to_string(), vec!["must be a boolean".to_string()]);
                None
            }
        };
        let update = Self {
            compare_disabled: field("compare_disabled"),
            fork_disabled: field("fork_disabled"),
        };
        finish(update, details)
    }
}

fn parse_object(body: &str) -> Result<Map<String, Value>, EngineError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => {
            let mut details = FieldErrors::new();
            details.insert("body".into(), vec!["must be a JSON object".into()]);
            Err(EngineError::InvalidInput {
                message: INVALID_REQUEST.into(),
                details,
            })
        }
        Err(_) => Err(EngineError::invalid(INVALID_JSON)),
    }
}

fn finish<T>(value: T, details: FieldErrors) -> Result<T, EngineError> {
    if details.is_empty() {
        Ok(value)
    } else {
        Err(EngineError::InvalidInput {
            message: INVALID_REQUEST.into(),
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn details(err: EngineError) -> FieldErrors {
        match err {
            EngineError::InvalidInput { details, .. } => details,
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn parses_valid_body() {
        let request = AlternativeRequest::from_json(
            r#"{"execution_id":"exec-1","node_id":"A","alternative_outcome":"retry","extra":1}"#,
        )
        .unwrap();
        assert_eq!(request, AlternativeRequest::new("exec-1", "A", "retry"));
    }

    #[test]
    fn malformed_json_has_no_details() {
        let err = AlternativeRequest::from_json("{not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON body.");
        assert!(details(err).is_empty());
    }

    #[test]
    fn reports_every_bad_field() {
        let err = AlternativeRequest::from_json(r#"{"execution_id":"","node_id":7}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request.");
        let details = details(err);
        assert_eq!(
            details.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["alternative_outcome", "execution_id", "node_id"]
        );
        assert_eq!(details["node_id"], vec![NON_EMPTY_STRING.to_string()]);
    }

    #[test]
    fn non_object_body_rejected() {
        let err = AlternativeRequest::from_json("[1,2]").unwrap_err();
        assert!(details(err).contains_key("body"));
    }

    #[test]
    fn typed_validation() {
        assert!(AlternativeRequest::new("e", "n", "a").validate().is_ok());
        let details = details(AlternativeRequest::new("e", "", "a").validate().unwrap_err());
        assert_eq!(details.len(), 1);
        assert!(details.contains_key("node_id"));
    }

    #[test]
    fn flag_update_requires_booleans() {
        let update = FlagUpdate::from_json(r#"{"compare_disabled":true}"#).unwrap();
        assert_eq!(update.compare_disabled, Some(true));
        assert_eq!(update.fork_disabled, None);

        let err = FlagUpdate::from_json(r#"{"fork_disabled":"yes"}"#).unwrap_err();
        assert!(details(err).contains_key("fork_disabled"));
    }
}
