//! CRM sales pipeline.
//!
//! Deals move left to right through a fixed set of stages. [`PipelineBoard`]
//! keeps a session cache of deals consistent with a [`DealStore`] while cards
//! are dragged between stage columns; [`filter`] and [`projection`] turn that
//! cache into the columns a board renders.

pub mod board;
pub mod deal;
pub mod error;
pub mod filter;
pub mod memory;
pub mod projection;
pub mod report;
pub mod stage;
pub mod store;

pub use board::{
    BoardSnapshot, DragEnd, DragOutcome, DragPhase, DragSession, Notice, NoticeLevel,
    PipelineBoard,
};
pub use deal::{Deal, DealDraft, DealId, DealPatch, FieldError, NewDeal, ValidationErrors};
pub use error::{BoardError, BoardResult};
pub use filter::{DealFilter, DealPredicate, filter_deals};
pub use memory::InMemoryDealStore;
pub use projection::{BoardView, StageColumn, project_board, project_stage};
pub use report::{PipelineReport, build_report};
pub use stage::{STAGES, Stage, StageInfo, StageRole, UnknownStage};
pub use store::{DealStore, StoreError, StoreResult};
