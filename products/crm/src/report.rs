//! Pipeline analytics over the deal list: totals, win rate, top contacts and
//! companies, recent activity.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::{
    deal::Deal,
    stage::{STAGES, Stage},
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCount {
    pub stage: Stage,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPerformance {
    pub name: String,
    pub company: String,
    pub total_value: f64,
    pub deal_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPerformance {
    pub company: String,
    pub opportunity_count: usize,
    pub total_value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub total_value: f64,
    pub win_rate: u32,
    pub stage_counts: Vec<StageCount>,
    pub top_contacts: Vec<ContactPerformance>,
    pub top_companies: Vec<CompanyPerformance>,
    pub recent_deals: Vec<Deal>,
}

pub const DEFAULT_TOP_LIMIT: usize = 5;
pub const DEFAULT_RECENT_DAYS: i64 = 30;
/// Widest `recent_days` window the API accepts.
pub const MAX_RECENT_DAYS: i64 = 36_500;

pub fn total_value(deals: &[Deal]) -> f64 {
    deals.iter().map(Deal::effective_value).sum()
}

pub fn stage_counts(deals: &[Deal]) -> Vec<StageCount> {
    STAGES
        .iter()
        .map(|info| StageCount {
            stage: info.stage,
            count: deals.iter().filter(|d| d.stage == info.stage).count(),
        })
        .collect()
}

/// Share of deals sitting in the terminal stage, as a rounded percentage.
pub fn win_rate(deals: &[Deal]) -> u32 {
    if deals.is_empty() {
        return 0;
    }
    let closed = deals.iter().filter(|d| d.stage.is_terminal()).count();
    ((closed as f64 / deals.len() as f64) * 100.0).round() as u32
}

pub fn top_contacts_by_value(deals: &[Deal], limit: usize) -> Vec<ContactPerformance> {
    let mut by_contact: HashMap<&str, ContactPerformance> = HashMap::new();
    for deal in deals {
        let Some(name) = deal.contact_name.as_deref() else {
            continue;
        };
        let entry = by_contact
            .entry(name)
            .or_insert_with(|| ContactPerformance {
                name: name.to_string(),
                company: deal
                    .company_name
                    .clone()
                    .unwrap_or_else(|| "No company".to_string()),
                total_value: 0.0,
                deal_count: 0,
            });
        entry.total_value += deal.effective_value();
        entry.deal_count += 1;
    }
    let mut ranked: Vec<ContactPerformance> = by_contact.into_values().collect();
    ranked.sort_by(|a, b| {
        b.total_value
            .total_cmp(&a.total_value)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

pub fn top_companies_by_opportunities(deals: &[Deal], limit: usize) -> Vec<CompanyPerformance> {
    let mut by_company: HashMap<&str, CompanyPerformance> = HashMap::new();
    for deal in deals {
        let Some(company) = deal.company_name.as_deref() else {
            continue;
        };
        let entry = by_company
            .entry(company)
            .or_insert_with(|| CompanyPerformance {
                company: company.to_string(),
                opportunity_count: 0,
                total_value: 0.0,
            });
        entry.opportunity_count += 1;
        entry.total_value += deal.effective_value();
    }
    let mut ranked: Vec<CompanyPerformance> = by_company.into_values().collect();
    ranked.sort_by(|a, b| {
        b.opportunity_count
            .cmp(&a.opportunity_count)
            .then_with(|| a.company.cmp(&b.company))
    });
    ranked.truncate(limit);
    ranked
}

/// Deals created within the last `days` days, in source order. A window
/// reaching past the representable calendar has no cutoff.
pub fn recent_deals(deals: &[Deal], now: DateTime<Utc>, days: i64) -> Vec<Deal> {
    let cutoff =
        TimeDelta::try_days(days.max(0)).and_then(|window| now.checked_sub_signed(window));
    deals
        .iter()
        .filter(|d| cutoff.is_none_or(|cutoff| d.created_at >= cutoff))
        .cloned()
        .collect()
}

pub fn build_report(
    deals: &[Deal],
    now: DateTime<Utc>,
    recent_days: i64,
    top_limit: usize,
) -> PipelineReport {
    PipelineReport {
        total_value: total_value(deals),
        win_rate: win_rate(deals),
        stage_counts: stage_counts(deals),
        top_contacts: top_contacts_by_value(deals, top_limit),
        top_companies: top_companies_by_opportunities(deals, top_limit),
        recent_deals: recent_deals(deals, now, recent_days),
    }
}
