//! Pipeline board controller.
//!
//! Owns the session cache of deals and is the only writer to it. Every write
//! either replaces the whole list (load, rollback reload) or touches exactly
//! one element by id, and each happens inside a single `send_modify` so
//! subscribers never observe a half-applied change.
//!
//! A drag runs `Idle -> Dragging -> Dropped -> Committing -> Committed |
//! RolledBack`. Drops outside any column or onto the origin column end the
//! drag without touching the cache or the store. A committed drop keeps the
//! optimistic write; a failed one reloads the whole list from the store. A
//! commit abandoned before the store answers puts the pre-move record back.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    deal::{Deal, DealDraft, DealId, DealPatch},
    error::{BoardError, BoardResult},
    filter::{DealFilter, filter_deals},
    projection::{BoardView, project_board},
    stage::Stage,
    store::{DealStore, StoreError},
};

pub const DEFAULT_NOTICE_CAPACITY: usize = 64;

const LOAD_FAILED: &str = "Failed to load deals";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub deals: Vec<Deal>,
    pub loading: bool,
    /// Cards with a stage move in flight; the UI renders them disabled.
    pub pending: BTreeSet<DealId>,
    pub load_error: Option<String>,
}

impl BoardSnapshot {
    pub fn deal(&self, id: DealId) -> Option<&Deal> {
        self.deals.iter().find(|deal| deal.id == id)
    }

    pub fn is_pending(&self, id: DealId) -> bool {
        self.pending.contains(&id)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Non-blocking user notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DragPhase {
    Idle,
    Dragging,
    Dropped,
    Committing,
    Committed,
    RolledBack,
}

/// A card being dragged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragSession {
    deal_id: DealId,
    origin: Option<Stage>,
}

impl DragSession {
    pub fn deal_id(&self) -> DealId {
        self.deal_id
    }

    /// Column the card was picked up from, if it was on the board.
    pub fn origin(&self) -> Option<Stage> {
        self.origin
    }

    pub fn phase(&self) -> DragPhase {
        DragPhase::Dragging
    }

    /// Ends the drag over `destination`, or outside every column on `None`.
    pub fn release(self, destination: Option<&str>) -> DragEnd {
        DragEnd {
            deal_id: self.deal_id,
            destination: destination.map(str::to_string),
        }
    }
}

/// Drag-end event as reported by the UI: the card and the column id it was
/// released over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragEnd {
    pub deal_id: DealId,
    pub destination: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DragOutcome {
    /// Released outside every column.
    Cancelled,
    /// Released over the origin column.
    Unchanged,
    /// The card already had a move in flight; the drop was ignored.
    Busy,
    Committed(Deal),
    RolledBack(BoardError),
}

impl DragOutcome {
    pub fn phase(&self) -> DragPhase {
        match self {
            DragOutcome::Cancelled | DragOutcome::Unchanged | DragOutcome::Busy => DragPhase::Idle,
            DragOutcome::Committed(_) => DragPhase::Committed,
            DragOutcome::RolledBack(_) => DragPhase::RolledBack,
        }
    }
}

enum Claim {
    Missing,
    Busy,
    Unchanged,
    Claimed(Deal),
}

/// Clears a card's pending marker when the transaction ends. If the
/// transaction future is dropped before the store answered, the optimistic
/// write is replaced with the record the store last reported.
struct PendingGuard<'a> {
    state: &'a watch::Sender<BoardSnapshot>,
    id: DealId,
    target: Stage,
    previous: Option<Deal>,
}

impl PendingGuard<'_> {
    /// Marks the store call as answered and hands back the pre-move record.
    fn settle(&mut self) -> Option<Deal> {
        self.previous.take()
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let id = self.id;
        let target = self.target;
        let abandoned = self.previous.take();
        if abandoned.is_some() {
            warn!(deal_id = id, "stage move abandoned before the store answered");
        }
        self.state.send_modify(|snapshot| {
            snapshot.pending.remove(&id);
            if let Some(previous) = abandoned {
                if let Some(slot) = snapshot.deals.iter_mut().find(|d| d.id == id) {
                    if slot.stage == target {
                        *slot = previous;
                    }
                }
            }
        });
    }
}

pub struct PipelineBoard<S> {
    store: Arc<S>,
    state: watch::Sender<BoardSnapshot>,
    notices: broadcast::Sender<Notice>,
}

impl<S: DealStore> PipelineBoard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_notice_capacity(store, DEFAULT_NOTICE_CAPACITY)
    }

    pub fn with_notice_capacity(store: Arc<S>, capacity: usize) -> Self {
        let (state, _) = watch::channel(BoardSnapshot::default());
        let (notices, _) = broadcast::channel(capacity.max(1));
        Self {
            store,
            state,
            notices,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.state.borrow().clone()
    }

    pub fn deal(&self, id: DealId) -> Option<Deal> {
        self.state.borrow().deal(id).cloned()
    }

    /// Filters the cached list and groups it into stage columns.
    pub fn view(&self, filter: &DealFilter) -> BoardView {
        let state = self.state.borrow();
        project_board(&filter_deals(&state.deals, filter))
    }

    /// Full fetch from the store, replacing the cache.
    pub async fn load(&self) -> BoardResult<()> {
        match self.reload().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.notify(NoticeLevel::Error, LOAD_FAILED);
                Err(err.into())
            }
        }
    }

    async fn reload(&self) -> Result<(), StoreError> {
        self.state.send_modify(|snapshot| snapshot.loading = true);
        match self.store.list_deals().await {
            Ok(deals) => {
                debug!(count = deals.len(), "deal list loaded");
                self.state.send_modify(|snapshot| {
                    snapshot.deals = deals;
                    snapshot.loading = false;
                    snapshot.load_error = None;
                });
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to load deals");
                self.state.send_modify(|snapshot| {
                    snapshot.loading = false;
                    snapshot.load_error = Some(LOAD_FAILED.to_string());
                });
                Err(err)
            }
        }
    }

    /// Picks up a card. Refused while the card has a move in flight.
    pub fn start_drag(&self, id: DealId) -> BoardResult<DragSession> {
        let state = self.state.borrow();
        if state.is_pending(id) {
            return Err(BoardError::TransactionInFlight(id));
        }
        Ok(DragSession {
            deal_id: id,
            origin: state.deal(id).map(|deal| deal.stage),
        })
    }

    pub async fn handle_drag_end(&self, event: DragEnd) -> DragOutcome {
        let Some(destination) = event.destination else {
            debug!(deal_id = event.deal_id, "card released outside the board");
            return DragOutcome::Cancelled;
        };
        let span = info_span!("board.drag", deal_id = event.deal_id, to = %destination);
        self.commit_drag(event.deal_id, &destination)
            .instrument(span)
            .await
    }

    /// Convenience for callers that already know the target stage.
    pub async fn move_deal(&self, id: DealId, stage: &str) -> DragOutcome {
        self.handle_drag_end(DragEnd {
            deal_id: id,
            destination: Some(stage.to_string()),
        })
        .await
    }

    async fn commit_drag(&self, id: DealId, destination: &str) -> DragOutcome {
        let stage = match destination.parse::<Stage>() {
            Ok(stage) => stage,
            Err(err) => return self.reject(err.into()),
        };

        let mut claim = Claim::Missing;
        self.state.send_if_modified(|snapshot| {
            if snapshot.pending.contains(&id) {
                claim = Claim::Busy;
                return false;
            }
            let Some(deal) = snapshot.deals.iter_mut().find(|deal| deal.id == id) else {
                return false;
            };
            if deal.stage == stage {
                claim = Claim::Unchanged;
                return false;
            }
            let previous = deal.clone();
            deal.transition_to(stage, Utc::now());
            snapshot.pending.insert(id);
            claim = Claim::Claimed(previous);
            true
        });

        let previous = match claim {
            Claim::Busy => {
                debug!("card already committing; drop ignored");
                return DragOutcome::Busy;
            }
            Claim::Unchanged => return DragOutcome::Unchanged,
            Claim::Missing => return self.reject(BoardError::UnknownDeal(id)),
            Claim::Claimed(previous) => previous,
        };
        info!(from = %previous.stage, "optimistic stage move applied");
        let mut pending = PendingGuard {
            state: &self.state,
            id,
            target: stage,
            previous: Some(previous),
        };

        let result = self.store.update_deal_stage(id, stage).await;
        let previous = pending.settle();
        match result {
            Ok(remote) => {
                // A reload triggered by another card may have replaced our
                // optimistic write with an older copy.
                self.state.send_if_modified(|snapshot| {
                    match snapshot.deals.iter_mut().find(|d| d.id == id) {
                        Some(slot) if slot.stage != stage => {
                            *slot = remote.clone();
                            true
                        }
                        _ => false,
                    }
                });
                self.notify(NoticeLevel::Success, "Deal moved successfully");
                DragOutcome::Committed(self.deal(id).unwrap_or(remote))
            }
            Err(err) => {
                warn!(error = %err, "stage update failed; reloading board");
                if let Some(previous) = previous {
                    self.rollback(previous).await;
                }
                self.notify(NoticeLevel::Error, "Failed to move deal. Please try again.");
                DragOutcome::RolledBack(err.into())
            }
        }
    }

    /// Discards an optimistic write by reloading everything. If the reload
    /// fails too, the record the store last reported goes back in its slot.
    async fn rollback(&self, previous: Deal) {
        if self.reload().await.is_err() {
            self.state.send_modify(|snapshot| {
                if let Some(slot) = snapshot.deals.iter_mut().find(|d| d.id == previous.id) {
                    *slot = previous;
                }
            });
        }
    }

    fn reject(&self, err: BoardError) -> DragOutcome {
        warn!(error = %err, "drag rejected");
        self.notify(NoticeLevel::Error, "Invalid drag operation");
        DragOutcome::RolledBack(err)
    }

    pub async fn create_deal(&self, draft: DealDraft) -> BoardResult<Deal> {
        let new = draft.validate()?;
        match self.store.create_deal(new).await {
            Ok(deal) => {
                info!(deal_id = deal.id, "deal created");
                self.state
                    .send_modify(|snapshot| snapshot.deals.push(deal.clone()));
                self.notify(NoticeLevel::Success, "Deal added successfully");
                Ok(deal)
            }
            Err(err) => {
                warn!(error = %err, "deal create failed");
                self.notify(NoticeLevel::Error, "Failed to add deal");
                Err(err.into())
            }
        }
    }

    pub async fn update_deal(&self, id: DealId, patch: DealPatch) -> BoardResult<Deal> {
        let patch = patch.validate()?;
        if self.state.borrow().is_pending(id) {
            return Err(BoardError::TransactionInFlight(id));
        }
        match self.store.update_deal(id, patch).await {
            Ok(deal) => {
                info!(deal_id = id, "deal updated");
                self.state.send_modify(|snapshot| {
                    match snapshot.deals.iter_mut().find(|d| d.id == id) {
                        Some(slot) => *slot = deal.clone(),
                        None => snapshot.deals.push(deal.clone()),
                    }
                });
                self.notify(NoticeLevel::Success, "Deal updated successfully");
                Ok(deal)
            }
            Err(err) => {
                warn!(deal_id = id, error = %err, "deal update failed");
                self.notify(NoticeLevel::Error, "Failed to update deal");
                Err(err.into())
            }
        }
    }

    pub async fn delete_deal(&self, id: DealId) -> BoardResult<()> {
        if self.state.borrow().is_pending(id) {
            return Err(BoardError::TransactionInFlight(id));
        }
        let result = match self.store.delete_deal(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(StoreError::Rejected(format!("deal {id} was not deleted"))),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                info!(deal_id = id, "deal deleted");
                self.remove_cached(id);
                self.notify(NoticeLevel::Success, "Deal deleted successfully");
                Ok(())
            }
            Err(err) => {
                warn!(deal_id = id, error = %err, "deal delete failed");
                if matches!(err, StoreError::NotFound(_)) {
                    self.remove_cached(id);
                }
                self.notify(NoticeLevel::Error, "Failed to delete deal");
                Err(err.into())
            }
        }
    }

    fn remove_cached(&self, id: DealId) {
        self.state.send_if_modified(|snapshot| {
            let before = snapshot.deals.len();
            snapshot.deals.retain(|deal| deal.id != id);
            snapshot.deals.len() != before
        });
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        // No receivers just means nobody is showing notices right now.
        let _ = self.notices.send(Notice {
            level,
            message: message.to_string(),
        });
    }
}
