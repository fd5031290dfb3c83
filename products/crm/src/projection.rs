use serde::Serialize;

use crate::{
    deal::Deal,
    stage::{STAGES, Stage, StageInfo},
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageColumn {
    pub stage: StageInfo,
    pub deals: Vec<Deal>,
    pub count: usize,
    pub total_value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub columns: Vec<StageColumn>,
    pub total_count: usize,
    pub total_value: f64,
}

impl BoardView {
    pub fn column(&self, stage: Stage) -> &StageColumn {
        &self.columns[stage.position()]
    }
}

/// Deals in `stage`, in source order, with count and summed value.
pub fn project_stage(deals: &[Deal], stage: Stage) -> StageColumn {
    let members: Vec<Deal> = deals
        .iter()
        .filter(|deal| deal.stage == stage)
        .cloned()
        .collect();
    let total_value = members.iter().map(Deal::effective_value).sum();
    StageColumn {
        stage: *stage.info(),
        count: members.len(),
        deals: members,
        total_value,
    }
}

/// One column per registered stage, left to right.
pub fn project_board(deals: &[Deal]) -> BoardView {
    let columns: Vec<StageColumn> = STAGES
        .iter()
        .map(|info| project_stage(deals, info.stage))
        .collect();
    let total_count = columns.iter().map(|col| col.count).sum();
    let total_value = columns.iter().map(|col| col.total_value).sum();
    BoardView {
        columns,
        total_count,
        total_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn deal(id: i32, stage: Stage, value: f64) -> Deal {
        let now = Utc::now();
        Deal {
            id,
            name: format!("Deal {id}"),
            value,
            stage,
            contact_name: None,
            contact_id: None,
            company_name: None,
            company_id: None,
            description: None,
            close_date: None,
            created_at: now,
            stage_updated_at: now,
        }
    }

    #[test]
    fn every_deal_lands_in_exactly_its_column() {
        let deals = vec![
            deal(1, Stage::Lead, 1000.0),
            deal(2, Stage::Qualified, 2000.0),
            deal(3, Stage::Lead, 250.0),
            deal(4, Stage::Closed, 900.0),
        ];
        let board = project_board(&deals);
        assert_eq!(board.columns.len(), STAGES.len());
        for d in &deals {
            let hits: Vec<Stage> = board
                .columns
                .iter()
                .filter(|col| col.deals.iter().any(|x| x.id == d.id))
                .map(|col| col.stage.stage)
                .collect();
            assert_eq!(hits, vec![d.stage]);
        }
        let lead_ids: Vec<i32> = board.column(Stage::Lead).deals.iter().map(|d| d.id).collect();
        assert_eq!(lead_ids, vec![1, 3]);
    }

    #[test]
    fn column_totals_conserve_value() {
        let deals = vec![
            deal(1, Stage::Lead, 1000.0),
            deal(2, Stage::Proposal, 2000.0),
            deal(3, Stage::Negotiation, 4000.0),
        ];
        let board = project_board(&deals);
        let sum: f64 = board.columns.iter().map(|col| col.total_value).sum();
        assert_eq!(sum, 7000.0);
        assert_eq!(board.total_value, 7000.0);
        assert_eq!(board.total_count, 3);
    }

    #[test]
    fn empty_stage_and_bad_values_total_zero() {
        let deals = vec![deal(1, Stage::Qualified, f64::NAN)];
        let qualified = project_stage(&deals, Stage::Qualified);
        assert_eq!(qualified.count, 1);
        assert_eq!(qualified.total_value, 0.0);
        let closed = project_stage(&deals, Stage::Closed);
        assert_eq!(closed.count, 0);
        assert_eq!(closed.total_value, 0.0);
        assert_eq!(closed.stage.display_name, "Closed Won/Lost");
    }
}
