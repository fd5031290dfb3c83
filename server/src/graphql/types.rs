use async_graphql::{Enum, InputObject, MaybeUndefined, SimpleObject};
use chrono::{DateTime, NaiveDate, Utc};
use products_crm::{
    BoardSnapshot, BoardView, Deal, DealDraft, DealFilter, DealPatch, PipelineReport, Stage,
    StageColumn, StageInfo, StageRole, report::{CompanyPerformance, ContactPerformance, StageCount},
};

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "PipelineStage")]
pub struct StageNode {
    pub id: String,
    pub display_name: String,
    pub color: String,
    pub position: i32,
    pub terminal: bool,
}

impl From<&StageInfo> for StageNode {
    fn from(info: &StageInfo) -> Self {
        Self {
            id: info.stage.as_str().to_string(),
            display_name: info.display_name.to_string(),
            color: info.color.to_string(),
            position: info.stage.position() as i32,
            terminal: info.role == StageRole::Terminal,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Deal")]
pub struct DealNode {
    pub id: i32,
    pub name: String,
    pub value: f64,
    pub stage: String,
    pub contact_name: Option<String>,
    pub contact_id: Option<i32>,
    pub company_name: Option<String>,
    pub company_id: Option<i32>,
    pub description: Option<String>,
    pub close_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub stage_updated_at: DateTime<Utc>,
    pub days_in_stage: i64,
    /// A stage move for this card has not been confirmed yet.
    pub pending: bool,
}

impl DealNode {
    pub fn from_deal(deal: Deal, now: DateTime<Utc>, pending: bool) -> Self {
        Self {
            days_in_stage: deal.days_in_stage(now),
            id: deal.id,
            name: deal.name,
            value: deal.value,
            stage: deal.stage.as_str().to_string(),
            contact_name: deal.contact_name,
            contact_id: deal.contact_id,
            company_name: deal.company_name,
            company_id: deal.company_id,
            description: deal.description,
            close_date: deal.close_date,
            created_at: deal.created_at,
            stage_updated_at: deal.stage_updated_at,
            pending,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "StageColumn")]
pub struct ColumnNode {
    pub stage: StageNode,
    pub deals: Vec<DealNode>,
    pub count: i32,
    pub total_value: f64,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "PipelineBoard")]
pub struct BoardNode {
    pub columns: Vec<ColumnNode>,
    pub total_count: i32,
    pub total_value: f64,
    pub loading: bool,
    pub load_error: Option<String>,
}

impl BoardNode {
    pub fn from_view(view: BoardView, snapshot: &BoardSnapshot, now: DateTime<Utc>) -> Self {
        let column = |col: StageColumn| ColumnNode {
            stage: StageNode::from(&col.stage),
            count: col.count as i32,
            total_value: col.total_value,
            deals: col
                .deals
                .into_iter()
                .map(|deal| {
                    let pending = snapshot.is_pending(deal.id);
                    DealNode::from_deal(deal, now, pending)
                })
                .collect(),
        };
        Self {
            columns: view.columns.into_iter().map(column).collect(),
            total_count: view.total_count as i32,
            total_value: view.total_value,
            loading: snapshot.loading,
            load_error: snapshot.load_error.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum MoveOutcome {
    Cancelled,
    Unchanged,
    Busy,
    Committed,
    RolledBack,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MoveDealPayload {
    pub outcome: MoveOutcome,
    /// The card as the board now holds it; absent when the deal is gone.
    pub deal: Option<DealNode>,
    pub error_code: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StageCountNode {
    pub stage: String,
    pub count: i32,
}

impl From<StageCount> for StageCountNode {
    fn from(value: StageCount) -> Self {
        Self {
            stage: value.stage.as_str().to_string(),
            count: value.count as i32,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ContactPerformanceNode {
    pub name: String,
    pub company: String,
    pub total_value: f64,
    pub deal_count: i32,
}

impl From<ContactPerformance> for ContactPerformanceNode {
    fn from(value: ContactPerformance) -> Self {
        Self {
            name: value.name,
            company: value.company,
            total_value: value.total_value,
            deal_count: value.deal_count as i32,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CompanyPerformanceNode {
    pub company: String,
    pub opportunity_count: i32,
    pub total_value: f64,
}

impl From<CompanyPerformance> for CompanyPerformanceNode {
    fn from(value: CompanyPerformance) -> Self {
        Self {
            company: value.company,
            opportunity_count: value.opportunity_count as i32,
            total_value: value.total_value,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "PipelineReport")]
pub struct ReportNode {
    pub total_value: f64,
    pub win_rate: i32,
    pub stage_counts: Vec<StageCountNode>,
    pub top_contacts: Vec<ContactPerformanceNode>,
    pub top_companies: Vec<CompanyPerformanceNode>,
    pub recent_deals: Vec<DealNode>,
}

impl ReportNode {
    pub fn from_report(report: PipelineReport, now: DateTime<Utc>) -> Self {
        Self {
            total_value: report.total_value,
            win_rate: report.win_rate as i32,
            stage_counts: report.stage_counts.into_iter().map(Into::into).collect(),
            top_contacts: report.top_contacts.into_iter().map(Into::into).collect(),
            top_companies: report.top_companies.into_iter().map(Into::into).collect(),
            recent_deals: report
                .recent_deals
                .into_iter()
                .map(|deal| DealNode::from_deal(deal, now, false))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct DealFilterInput {
    pub query: Option<String>,
    pub stage: Option<String>,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub contact: Option<String>,
}

impl From<DealFilterInput> for DealFilter {
    fn from(input: DealFilterInput) -> Self {
        DealFilter {
            query: input.query.unwrap_or_default(),
            stage: input.stage.unwrap_or_default(),
            min_value: input.min_value.unwrap_or_default(),
            max_value: input.max_value.unwrap_or_default(),
            start_date: input.start_date.unwrap_or_default(),
            end_date: input.end_date.unwrap_or_default(),
            contact: input.contact.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct NewDealInput {
    pub name: String,
    pub value: f64,
    pub stage: Option<String>,
    pub contact_name: Option<String>,
    pub contact_id: Option<i32>,
    pub company_name: Option<String>,
    pub company_id: Option<i32>,
    pub description: Option<String>,
    pub close_date: Option<NaiveDate>,
}

impl NewDealInput {
    pub fn into_draft(self, stage: Option<Stage>) -> DealDraft {
        DealDraft {
            name: self.name,
            value: self.value,
            stage,
            contact_name: self.contact_name,
            contact_id: self.contact_id,
            company_name: self.company_name,
            company_id: self.company_id,
            description: self.description,
            close_date: self.close_date,
        }
    }
}

/// Blank text clears a field; `closeDate: null` clears the date.
#[derive(Clone, Debug, InputObject)]
pub struct UpdateDealInput {
    pub name: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<String>,
    pub contact_name: Option<String>,
    pub contact_id: Option<i32>,
    pub company_name: Option<String>,
    pub company_id: Option<i32>,
    pub description: Option<String>,
    pub close_date: MaybeUndefined<NaiveDate>,
}

impl UpdateDealInput {
    pub fn into_patch(self, stage: Option<Stage>) -> DealPatch {
        DealPatch {
            name: self.name,
            value: self.value,
            stage,
            contact_name: self.contact_name,
            contact_id: self.contact_id,
            company_name: self.company_name,
            company_id: self.company_id,
            description: self.description,
            close_date: match self.close_date {
                MaybeUndefined::Undefined => None,
                MaybeUndefined::Null => Some(None),
                MaybeUndefined::Value(date) => Some(Some(date)),
            },
        }
    }
}
