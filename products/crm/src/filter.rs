//! Search and filter composition applied to the deal list before projection.
//!
//! Criteria arrive as raw form strings. Blank values impose no constraint and
//! malformed numbers or dates are dropped instead of failing the render.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{deal::Deal, stage::Stage};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DealFilter {
    pub query: String,
    pub stage: String,
    pub min_value: String,
    pub max_value: String,
    pub start_date: String,
    pub end_date: String,
    pub contact: String,
}

/// Stage constraint after parsing. An id outside the registry still
/// constrains, it just matches nothing.
#[derive(Clone, Debug, PartialEq)]
enum StageCriterion {
    Any,
    Is(Stage),
    Unknown,
}

/// Parsed criteria; the conjunction of everything present.
#[derive(Clone, Debug, PartialEq)]
pub struct DealPredicate {
    query: Option<String>,
    stage: StageCriterion,
    min_value: Option<f64>,
    max_value: Option<f64>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    contact: Option<String>,
}

impl DealFilter {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.query,
            &self.stage,
            &self.min_value,
            &self.max_value,
            &self.start_date,
            &self.end_date,
            &self.contact,
        ]
        .iter()
        .all(|value| value.trim().is_empty())
    }

    pub fn compile(&self) -> DealPredicate {
        let stage = match present(&self.stage) {
            None => StageCriterion::Any,
            Some(raw) => match raw.parse::<Stage>() {
                Ok(stage) => StageCriterion::Is(stage),
                Err(_) => StageCriterion::Unknown,
            },
        };
        DealPredicate {
            query: present(&self.query).map(str::to_lowercase),
            stage,
            min_value: parse_amount("minValue", &self.min_value),
            max_value: parse_amount("maxValue", &self.max_value),
            start: parse_bound("startDate", &self.start_date, Bound::Start),
            end: parse_bound("endDate", &self.end_date, Bound::End),
            contact: present(&self.contact).map(str::to_lowercase),
        }
    }
}

impl DealPredicate {
    pub fn matches(&self, deal: &Deal) -> bool {
        if let Some(query) = &self.query {
            let in_name = contains_ci(Some(&deal.name), query);
            let in_contact = contains_ci(deal.contact_name.as_deref(), query);
            if !in_name && !in_contact {
                return false;
            }
        }
        match self.stage {
            StageCriterion::Any => {}
            StageCriterion::Is(stage) if deal.stage == stage => {}
            _ => return false,
        }
        if let Some(min) = self.min_value {
            if deal.value.is_nan() || deal.value < min {
                return false;
            }
        }
        if let Some(max) = self.max_value {
            if deal.value.is_nan() || deal.value > max {
                return false;
            }
        }
        if let Some(start) = self.start {
            if deal.stage_updated_at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if deal.stage_updated_at > end {
                return false;
            }
        }
        if let Some(contact) = &self.contact {
            if !contains_ci(deal.contact_name.as_deref(), contact) {
                return false;
            }
        }
        true
    }
}

/// Keeps matching deals in source order.
pub fn filter_deals(deals: &[Deal], filter: &DealFilter) -> Vec<Deal> {
    let predicate = filter.compile();
    deals
        .iter()
        .filter(|deal| predicate.matches(deal))
        .cloned()
        .collect()
}

fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack
        .map(|value| value.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
}

fn present(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_amount(field: &'static str, raw: &str) -> Option<f64> {
    let value = present(raw)?;
    match value.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Some(amount),
        _ => {
            debug!(field, value, "ignoring malformed amount filter");
            None
        }
    }
}

#[derive(Copy, Clone)]
enum Bound {
    Start,
    End,
}

fn parse_bound(field: &'static str, raw: &str, bound: Bound) -> Option<DateTime<Utc>> {
    let value = present(raw)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => {
            let start = date.and_time(NaiveTime::MIN).and_utc();
            Some(match bound {
                Bound::Start => start,
                Bound::End => start + Duration::days(1) - Duration::nanoseconds(1),
            })
        }
        Err(_) => {
            debug!(field, value, "ignoring malformed date filter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn deal(id: i32, name: &str, contact: Option<&str>, stage: Stage, value: f64) -> Deal {
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap();
        Deal {
            id,
            name: name.into(),
            value,
            stage,
            contact_name: contact.map(Into::into),
            contact_id: None,
            company_name: None,
            company_id: None,
            description: None,
            close_date: None,
            created_at: at,
            stage_updated_at: at,
        }
    }

    fn fixtures() -> Vec<Deal> {
        vec![
            deal(1, "ACME Pilot", Some("Dana Scully"), Stage::Lead, 1000.0),
            deal(2, "Rust Tooling", Some("Fox Mulder"), Stage::Qualified, 2000.0),
            deal(3, "NuFlights Annual", None, Stage::Proposal, 3500.0),
        ]
    }

    fn ids(deals: &[Deal]) -> Vec<i32> {
        deals.iter().map(|d| d.id).collect()
    }

    #[test]
    fn empty_criteria_keep_everything_in_order() {
        let deals = fixtures();
        let filter = DealFilter {
            query: "  ".into(),
            ..Default::default()
        };
        assert!(filter.is_empty());
        assert_eq!(filter_deals(&deals, &filter), deals);
    }

    #[test]
    fn query_matches_name_or_contact_case_insensitively() {
        let deals = fixtures();
        assert_eq!(ids(&filter_deals(&deals, &DealFilter::with_query("acme"))), [1]);
        assert_eq!(ids(&filter_deals(&deals, &DealFilter::with_query("MULDER"))), [2]);
        assert_eq!(ids(&filter_deals(&deals, &DealFilter::with_query("l"))), [1, 2, 3]);
    }

    #[test]
    fn value_bounds_are_inclusive() {
        let deals = fixtures();
        let filter = DealFilter {
            min_value: "2000".into(),
            max_value: "3500".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_deals(&deals, &filter)), [2, 3]);
    }

    #[test]
    fn malformed_amounts_are_ignored() {
        let deals = fixtures();
        let filter = DealFilter {
            min_value: "lots".into(),
            max_value: "2000".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_deals(&deals, &filter)), [1, 2]);
    }

    #[test]
    fn unknown_stage_matches_nothing() {
        let deals = fixtures();
        let filter = DealFilter {
            stage: "archived".into(),
            ..Default::default()
        };
        assert!(filter_deals(&deals, &filter).is_empty());
    }

    #[test]
    fn date_only_end_bound_covers_whole_day() {
        let deals = fixtures();
        let filter = DealFilter {
            start_date: "2025-03-10".into(),
            end_date: "2025-03-10".into(),
            ..Default::default()
        };
        assert_eq!(filter_deals(&deals, &filter).len(), 3);

        let before = DealFilter {
            end_date: "2025-03-09".into(),
            ..Default::default()
        };
        assert!(filter_deals(&deals, &before).is_empty());

        let garbage = DealFilter {
            start_date: "next tuesday".into(),
            ..Default::default()
        };
        assert_eq!(filter_deals(&deals, &garbage).len(), 3);
    }

    #[test]
    fn contact_filter_skips_deals_without_contact() {
        let deals = fixtures();
        let filter = DealFilter {
            contact: "scully".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_deals(&deals, &filter)), [1]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let deals = fixtures();
        let filter = DealFilter {
            query: "a".into(),
            min_value: "1500".into(),
            ..Default::default()
        };
        let once = filter_deals(&deals, &filter);
        let twice = filter_deals(&once, &filter);
        assert_eq!(once, twice);
    }
}
