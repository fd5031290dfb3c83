use thiserror::Error;

use crate::{
    deal::{DealId, ValidationErrors},
    stage::UnknownStage,
    store::StoreError,
};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BoardError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("unknown pipeline stage `{0}`")]
    UnknownStage(String),
    #[error("deal {0} is not on the board")]
    UnknownDeal(DealId),
    #[error("deal {0} already has a move in flight")]
    TransactionInFlight(DealId),
    #[error("deal {0} no longer exists")]
    NotFound(DealId),
    #[error("store call failed: {0}")]
    Remote(StoreError),
}

pub type BoardResult<T> = Result<T, BoardError>;

impl BoardError {
    /// Rejected locally, before any store call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BoardError::Validation(_) | BoardError::UnknownStage(_) | BoardError::UnknownDeal(_)
        )
    }
}

impl From<ValidationErrors> for BoardError {
    fn from(value: ValidationErrors) -> Self {
        BoardError::Validation(value)
    }
}

impl From<UnknownStage> for BoardError {
    fn from(value: UnknownStage) -> Self {
        BoardError::UnknownStage(value.0)
    }
}

impl From<StoreError> for BoardError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => BoardError::NotFound(id),
            other => BoardError::Remote(other),
        }
    }
}
