//! In-process [`DealStore`] used by tests and local demos. It can be told to
//! fail or stall stage updates so the board's rollback paths can be exercised.

use std::{collections::VecDeque, sync::Arc};

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};

use crate::{
    deal::{Deal, DealId, DealPatch, NewDeal},
    stage::Stage,
    store::{DealStore, StoreError, StoreResult},
};

#[derive(Default)]
struct MemoryState {
    deals: Vec<Deal>,
    next_id: DealId,
    stage_failures: VecDeque<StoreError>,
    list_failures: VecDeque<StoreError>,
    gate: Option<Arc<Semaphore>>,
    list_calls: usize,
    stage_update_calls: usize,
}

#[derive(Default)]
pub struct InMemoryDealStore {
    state: Mutex<MemoryState>,
}

impl InMemoryDealStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing records. The id sequence continues after
    /// the highest seeded id.
    pub fn with_deals(deals: Vec<Deal>) -> Self {
        let next_id = deals.iter().map(|d| d.id).max().unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState {
                deals,
                next_id,
                ..Default::default()
            }),
        }
    }

    pub async fn fail_next_stage_update(&self, err: StoreError) {
        self.state.lock().await.stage_failures.push_back(err);
    }

    pub async fn fail_next_list(&self, err: StoreError) {
        self.state.lock().await.list_failures.push_back(err);
    }

    /// Stage updates wait until [`release_stage_updates`](Self::release_stage_updates).
    pub async fn hold_stage_updates(&self) {
        self.state.lock().await.gate = Some(Arc::new(Semaphore::new(0)));
    }

    pub async fn release_stage_updates(&self) {
        if let Some(gate) = self.state.lock().await.gate.take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Simulates an edit made by another session.
    pub async fn set_stage_remotely(&self, id: DealId, stage: Stage) -> StoreResult<Deal> {
        let mut state = self.state.lock().await;
        let deal = find_mut(&mut state.deals, id)?;
        deal.transition_to(stage, Utc::now());
        Ok(deal.clone())
    }

    /// Simulates a deletion made by another session.
    pub async fn remove_remotely(&self, id: DealId) {
        self.state.lock().await.deals.retain(|deal| deal.id != id);
    }

    pub async fn snapshot(&self) -> Vec<Deal> {
        self.state.lock().await.deals.clone()
    }

    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_calls
    }

    pub async fn stage_update_calls(&self) -> usize {
        self.state.lock().await.stage_update_calls
    }
}

fn find_mut(deals: &mut [Deal], id: DealId) -> StoreResult<&mut Deal> {
    deals
        .iter_mut()
        .find(|deal| deal.id == id)
        .ok_or(StoreError::NotFound(id))
}

impl DealStore for InMemoryDealStore {
    async fn list_deals(&self) -> StoreResult<Vec<Deal>> {
        let mut state = self.state.lock().await;
        state.list_calls += 1;
        if let Some(err) = state.list_failures.pop_front() {
            return Err(err);
        }
        Ok(state.deals.clone())
    }

    async fn get_deal(&self, id: DealId) -> StoreResult<Deal> {
        let mut state = self.state.lock().await;
        find_mut(&mut state.deals, id).map(|deal| deal.clone())
    }

    async fn update_deal_stage(&self, id: DealId, stage: Stage) -> StoreResult<Deal> {
        let gate = {
            let mut state = self.state.lock().await;
            state.stage_update_calls += 1;
            state.gate.clone()
        };
        if let Some(gate) = gate {
            // A closed semaphore still lets the update through.
            let _permit = gate.acquire().await;
        }
        let mut state = self.state.lock().await;
        if let Some(err) = state.stage_failures.pop_front() {
            return Err(err);
        }
        let deal = find_mut(&mut state.deals, id)?;
        deal.transition_to(stage, Utc::now());
        Ok(deal.clone())
    }

    async fn create_deal(&self, new: NewDeal) -> StoreResult<Deal> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let now = Utc::now();
        let deal = Deal {
            id: state.next_id,
            name: new.name,
            value: new.value,
            stage: new.stage,
            contact_name: new.contact_name,
            contact_id: new.contact_id,
            company_name: new.company_name,
            company_id: new.company_id,
            description: new.description,
            close_date: new.close_date,
            created_at: now,
            stage_updated_at: now,
        };
        state.deals.push(deal.clone());
        Ok(deal)
    }

    async fn update_deal(&self, id: DealId, patch: DealPatch) -> StoreResult<Deal> {
        let mut state = self.state.lock().await;
        let deal = find_mut(&mut state.deals, id)?;
        patch.apply(deal, Utc::now());
        Ok(deal.clone())
    }

    async fn delete_deal(&self, id: DealId) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.deals.len();
        state.deals.retain(|deal| deal.id != id);
        if state.deals.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, value: f64) -> NewDeal {
        NewDeal {
            name: name.into(),
            value,
            stage: Stage::Lead,
            contact_name: None,
            contact_id: None,
            company_name: None,
            company_id: None,
            description: None,
            close_date: None,
        }
    }

    #[tokio::test]
    async fn assigns_sequential_ids_and_stamps() {
        let store = InMemoryDealStore::new();
        let a = store.create_deal(draft("A", 10.0)).await.unwrap();
        let b = store.create_deal(draft("B", 20.0)).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.created_at, a.stage_updated_at);
        assert_eq!(store.list_deals().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn injected_failure_applies_nothing() {
        let store = InMemoryDealStore::new();
        let deal = store.create_deal(draft("A", 10.0)).await.unwrap();
        store
            .fail_next_stage_update(StoreError::Unavailable("offline".into()))
            .await;
        let err = store
            .update_deal_stage(deal.id, Stage::Proposal)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Unavailable("offline".into()));
        assert_eq!(store.get_deal(deal.id).await.unwrap().stage, Stage::Lead);
        assert_eq!(store.stage_update_calls().await, 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = InMemoryDealStore::new();
        assert_eq!(
            store.update_deal_stage(9, Stage::Closed).await,
            Err(StoreError::NotFound(9))
        );
        assert_eq!(store.delete_deal(9).await, Err(StoreError::NotFound(9)));
    }
}
