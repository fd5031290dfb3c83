use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions, Value};
use products_crm::{BoardError, ValidationErrors};
use serde::Serialize;
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldMessage {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<FieldMessage>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    RemoteFailure(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::RemoteFailure(_) => "REMOTE_FAILURE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(value: ValidationErrors) -> Self {
        ApiError::Validation {
            message: value.to_string(),
            fields: value
                .fields
                .iter()
                .map(|err| FieldMessage {
                    field: err.field.to_string(),
                    message: err.message.clone(),
                })
                .collect(),
        }
    }
}

impl From<BoardError> for ApiError {
    fn from(value: BoardError) -> Self {
        match value {
            BoardError::Validation(fields) => fields.into(),
            err @ (BoardError::UnknownStage(_) | BoardError::UnknownDeal(_)) => {
                ApiError::validation(err.to_string())
            }
            BoardError::NotFound(id) => ApiError::NotFound(format!("deal {id} not found")),
            err @ BoardError::TransactionInFlight(_) => ApiError::Conflict(err.to_string()),
            BoardError::Remote(err) => {
                tracing::warn!(error = %err, "store call failed");
                ApiError::RemoteFailure(err.to_string())
            }
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::Validation { fields, .. } = self {
            if !fields.is_empty() {
                let map: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|f| (f.field.clone(), serde_json::Value::from(f.message.clone())))
                    .collect();
                if let Ok(value) = Value::from_json(serde_json::Value::Object(map)) {
                    err = err.extend_with(|_err, e| e.set("fields", value));
                }
            }
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

/// Map a board failure onto a coded GraphQL error.
pub fn board_error(err: BoardError) -> Error {
    ApiError::from(err).extend()
}

#[cfg(test)]
mod tests {
    use super::*;
    use products_crm::{DealDraft, StoreError};

    fn code_of(err: &Error) -> Option<Value> {
        err.extensions
            .as_ref()
            .and_then(|map| map.get("code"))
            .cloned()
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("boom"));
        assert_eq!(err.message, "internal server error");
        assert_eq!(code_of(&err), Some(Value::from("INTERNAL")));
    }

    #[test]
    fn validation_errors_carry_fields() {
        let fields = DealDraft::default().validate().unwrap_err();
        let err = board_error(BoardError::Validation(fields));
        assert_eq!(code_of(&err), Some(Value::from("VALIDATION")));
        let extensions = err.extensions.as_ref().unwrap();
        let Some(Value::Object(fields)) = extensions.get("fields") else {
            panic!("expected field map");
        };
        assert!(fields.contains_key("name"));
    }

    #[test]
    fn board_errors_map_to_codes() {
        let cases = [
            (BoardError::UnknownStage("archived".into()), "VALIDATION"),
            (BoardError::UnknownDeal(9), "VALIDATION"),
            (BoardError::NotFound(9), "NOT_FOUND"),
            (BoardError::TransactionInFlight(9), "CONFLICT"),
            (
                BoardError::Remote(StoreError::Unavailable("down".into())),
                "REMOTE_FAILURE",
            ),
        ];
        for (board, code) in cases {
            assert_eq!(ApiError::from(board).code(), code);
        }
    }
}
