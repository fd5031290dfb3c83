mod types;

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject};
use chrono::Utc;
use platform_api::{ApiError, ApiResult, board_error};
use platform_db::SeaOrmDealStore;
use products_crm::{
    BoardError, DragOutcome, PipelineBoard, STAGES, Stage, build_report,
    report::{DEFAULT_RECENT_DAYS, DEFAULT_TOP_LIMIT, MAX_RECENT_DAYS},
};
use serde::Serialize;
use tracing::instrument;

pub use types::*;

pub type BoardHandle = Arc<PipelineBoard<SeaOrmDealStore>>;
pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(board: BoardHandle) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(board)
        .finish()
}

/// SDL snapshot; needs no board.
pub fn schema_sdl() -> String {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .finish()
        .sdl()
}

fn board<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a BoardHandle> {
    ctx.data::<BoardHandle>()
}

fn parse_stage(raw: Option<String>) -> async_graphql::Result<Option<Stage>> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .parse::<Stage>()
            .map(Some)
            .map_err(|err| board_error(err.into())),
    }
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> ApiResult<HealthPayload> {
        Ok(HealthPayload { ok: true })
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> ApiResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    #[graphql(name = "pipelineStages")]
    async fn pipeline_stages(&self) -> Vec<StageNode> {
        STAGES.iter().map(StageNode::from).collect()
    }

    #[graphql(name = "pipelineBoard")]
    #[instrument(name = "graphql.pipeline_board", skip_all)]
    async fn pipeline_board(
        &self,
        ctx: &Context<'_>,
        filter: Option<DealFilterInput>,
    ) -> async_graphql::Result<BoardNode> {
        let board = board(ctx)?;
        let filter = filter.unwrap_or_default().into();
        let snapshot = board.snapshot();
        let view = board.view(&filter);
        Ok(BoardNode::from_view(view, &snapshot, Utc::now()))
    }

    #[instrument(name = "graphql.deal", skip(self, ctx))]
    async fn deal(&self, ctx: &Context<'_>, id: i32) -> async_graphql::Result<Option<DealNode>> {
        let board = board(ctx)?;
        let snapshot = board.snapshot();
        Ok(snapshot
            .deal(id)
            .cloned()
            .map(|deal| DealNode::from_deal(deal, Utc::now(), snapshot.is_pending(id))))
    }

    #[graphql(name = "pipelineReport")]
    #[instrument(name = "graphql.pipeline_report", skip(self, ctx))]
    async fn pipeline_report(
        &self,
        ctx: &Context<'_>,
        recent_days: Option<i32>,
        top_limit: Option<i32>,
    ) -> async_graphql::Result<ReportNode> {
        let board = board(ctx)?;
        let recent_days = recent_days.map(i64::from).unwrap_or(DEFAULT_RECENT_DAYS);
        if !(0..=MAX_RECENT_DAYS).contains(&recent_days) {
            return Err(ApiError::validation(format!(
                "recentDays must be between 0 and {MAX_RECENT_DAYS}"
            ))
            .extend());
        }
        let top_limit = match top_limit {
            Some(limit) if limit < 0 => {
                return Err(ApiError::validation("topLimit must not be negative").extend());
            }
            Some(limit) => limit as usize,
            None => DEFAULT_TOP_LIMIT,
        };
        let now = Utc::now();
        let deals = board.snapshot().deals;
        let report = build_report(&deals, now, recent_days, top_limit);
        Ok(ReportNode::from_report(report, now))
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Drops the card on `stage`. Validation failures come back as errors;
    /// a store failure is reported through the payload after rollback.
    #[graphql(name = "moveDeal")]
    #[instrument(name = "graphql.move_deal", skip(self, ctx))]
    async fn move_deal(
        &self,
        ctx: &Context<'_>,
        id: i32,
        stage: String,
    ) -> async_graphql::Result<MoveDealPayload> {
        let board = board(ctx)?;
        let outcome = board.move_deal(id, &stage).await;
        let (outcome, error) = match outcome {
            DragOutcome::RolledBack(err) if err.is_validation() => return Err(board_error(err)),
            DragOutcome::Cancelled => (MoveOutcome::Cancelled, None),
            DragOutcome::Unchanged => (MoveOutcome::Unchanged, None),
            DragOutcome::Busy => (
                MoveOutcome::Busy,
                Some(ApiError::from(BoardError::TransactionInFlight(id))),
            ),
            DragOutcome::Committed(_) => (MoveOutcome::Committed, None),
            DragOutcome::RolledBack(err) => (MoveOutcome::RolledBack, Some(ApiError::from(err))),
        };
        let snapshot = board.snapshot();
        let deal = snapshot
            .deal(id)
            .cloned()
            .map(|deal| DealNode::from_deal(deal, Utc::now(), snapshot.is_pending(id)));
        Ok(MoveDealPayload {
            outcome,
            deal,
            error_code: error.as_ref().map(|err| err.code().to_string()),
            message: error.map(|err| err.to_string()),
        })
    }

    #[graphql(name = "createDeal")]
    #[instrument(name = "graphql.create_deal", skip_all)]
    async fn create_deal(
        &self,
        ctx: &Context<'_>,
        input: NewDealInput,
    ) -> async_graphql::Result<DealNode> {
        let board = board(ctx)?;
        let stage = parse_stage(input.stage.clone())?;
        let deal = board
            .create_deal(input.into_draft(stage))
            .await
            .map_err(board_error)?;
        Ok(DealNode::from_deal(deal, Utc::now(), false))
    }

    #[graphql(name = "updateDeal")]
    #[instrument(name = "graphql.update_deal", skip(self, ctx, input))]
    async fn update_deal(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: UpdateDealInput,
    ) -> async_graphql::Result<DealNode> {
        let board = board(ctx)?;
        let stage = parse_stage(input.stage.clone())?;
        let deal = board
            .update_deal(id, input.into_patch(stage))
            .await
            .map_err(board_error)?;
        Ok(DealNode::from_deal(deal, Utc::now(), false))
    }

    #[graphql(name = "deleteDeal")]
    #[instrument(name = "graphql.delete_deal", skip(self, ctx))]
    async fn delete_deal(&self, ctx: &Context<'_>, id: i32) -> async_graphql::Result<bool> {
        let board = board(ctx)?;
        board.delete_deal(id).await.map_err(board_error)?;
        Ok(true)
    }

    /// Refetches the whole list from the store.
    #[graphql(name = "reloadDeals")]
    #[instrument(name = "graphql.reload_deals", skip_all)]
    async fn reload_deals(&self, ctx: &Context<'_>) -> async_graphql::Result<BoardNode> {
        let board = board(ctx)?;
        board.load().await.map_err(board_error)?;
        let snapshot = board.snapshot();
        let view = board.view(&Default::default());
        Ok(BoardNode::from_view(view, &snapshot, Utc::now()))
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}
