//! Abstract deal store. The remote store is the system of record; the board
//! only caches what it reports.

use std::future::Future;

use thiserror::Error;

use crate::{
    deal::{Deal, DealId, DealPatch, NewDeal},
    stage::Stage,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("deal {0} not found")]
    NotFound(DealId),
    #[error("rejected by store: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the pipeline board needs from the store. Implementations assign
/// ids and own `created_at` / `stage_updated_at`; a failed call applies
/// nothing.
pub trait DealStore: Send + Sync {
    fn list_deals(&self) -> impl Future<Output = StoreResult<Vec<Deal>>> + Send;

    fn get_deal(&self, id: DealId) -> impl Future<Output = StoreResult<Deal>> + Send;

    fn update_deal_stage(
        &self,
        id: DealId,
        stage: Stage,
    ) -> impl Future<Output = StoreResult<Deal>> + Send;

    fn create_deal(&self, deal: NewDeal) -> impl Future<Output = StoreResult<Deal>> + Send;

    fn update_deal(
        &self,
        id: DealId,
        patch: DealPatch,
    ) -> impl Future<Output = StoreResult<Deal>> + Send;

    fn delete_deal(&self, id: DealId) -> impl Future<Output = StoreResult<bool>> + Send;
}
