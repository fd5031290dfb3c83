use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Store-assigned identity; never reassigned.
pub type DealId = i32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: DealId,
    pub name: String,
    pub value: f64,
    pub stage: Stage,
    pub contact_name: Option<String>,
    pub contact_id: Option<i32>,
    pub company_name: Option<String>,
    pub company_id: Option<i32>,
    pub description: Option<String>,
    pub close_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub stage_updated_at: DateTime<Utc>,
}

impl Deal {
    /// Value used for aggregation. Anything that is not a finite,
    /// non-negative amount counts as zero.
    pub fn effective_value(&self) -> f64 {
        if self.value.is_finite() && self.value > 0.0 {
            self.value
        } else {
            0.0
        }
    }

    /// Whole days spent in the current stage, rounded up.
    pub fn days_in_stage(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = now.signed_duration_since(self.stage_updated_at);
        let seconds = elapsed.num_seconds().abs();
        (seconds + 86_399) / 86_400
    }

    /// Moves the record into `stage`, stamping the transition time. The stamp
    /// never goes backwards and never precedes `created_at`.
    pub fn transition_to(&mut self, stage: Stage, at: DateTime<Utc>) {
        if self.stage == stage {
            return;
        }
        self.stage = stage;
        self.stage_updated_at = at.max(self.stage_updated_at).max(self.created_at);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Field-scoped problems found before any store call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|err| err.field == field)
            .map(|err| err.message.as_str())
    }

    fn into_result<T>(self, ok: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(ok) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// User input from the add-deal form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDraft {
    pub name: String,
    pub value: f64,
    pub stage: Option<Stage>,
    pub contact_name: Option<String>,
    pub contact_id: Option<i32>,
    pub company_name: Option<String>,
    pub company_id: Option<i32>,
    pub description: Option<String>,
    pub close_date: Option<NaiveDate>,
}

/// A draft that passed validation, ready for the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewDeal {
    pub name: String,
    pub value: f64,
    pub stage: Stage,
    pub contact_name: Option<String>,
    pub contact_id: Option<i32>,
    pub company_name: Option<String>,
    pub company_id: Option<i32>,
    pub description: Option<String>,
    pub close_date: Option<NaiveDate>,
}

impl DealDraft {
    pub fn validate(self) -> Result<NewDeal, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = self.name.trim().to_string();
        check_name(&mut errors, &name);
        check_value(&mut errors, self.value);
        errors.into_result(NewDeal {
            name,
            value: self.value,
            stage: self.stage.unwrap_or_default(),
            contact_name: non_blank(self.contact_name),
            contact_id: self.contact_id,
            company_name: non_blank(self.company_name),
            company_id: self.company_id,
            description: non_blank(self.description),
            close_date: self.close_date,
        })
    }
}

/// Partial edit. `None` leaves a field untouched. A blank contact, company or
/// description clears that field, and `close_date: Some(None)` clears the date.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPatch {
    pub name: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<Stage>,
    pub contact_name: Option<String>,
    pub contact_id: Option<i32>,
    pub company_name: Option<String>,
    pub company_id: Option<i32>,
    pub description: Option<String>,
    pub close_date: Option<Option<NaiveDate>>,
}

impl DealPatch {
    pub fn validate(mut self) -> Result<DealPatch, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(name) = self.name.take() {
            let name = name.trim().to_string();
            check_name(&mut errors, &name);
            self.name = Some(name);
        }
        if let Some(value) = self.value {
            check_value(&mut errors, value);
        }
        for field in [
            &mut self.contact_name,
            &mut self.company_name,
            &mut self.description,
        ] {
            if let Some(text) = field {
                *text = text.trim().to_string();
            }
        }
        errors.into_result(self)
    }

    pub fn is_empty(&self) -> bool {
        *self == DealPatch::default()
    }

    /// Applies the edit to a stored record. Returns whether the stage moved.
    pub fn apply(&self, deal: &mut Deal, at: DateTime<Utc>) -> bool {
        if let Some(name) = &self.name {
            deal.name = name.clone();
        }
        if let Some(value) = self.value {
            deal.value = value;
        }
        if let Some(contact_name) = &self.contact_name {
            deal.contact_name = non_blank(Some(contact_name.clone()));
            if deal.contact_name.is_none() {
                deal.contact_id = None;
            }
        }
        if let Some(contact_id) = self.contact_id {
            deal.contact_id = Some(contact_id);
        }
        if let Some(company_name) = &self.company_name {
            deal.company_name = non_blank(Some(company_name.clone()));
            if deal.company_name.is_none() {
                deal.company_id = None;
            }
        }
        if let Some(company_id) = self.company_id {
            deal.company_id = Some(company_id);
        }
        if let Some(description) = &self.description {
            deal.description = non_blank(Some(description.clone()));
        }
        if let Some(close_date) = self.close_date {
            deal.close_date = close_date;
        }
        match self.stage {
            Some(stage) if stage != deal.stage => {
                deal.transition_to(stage, at);
                true
            }
            _ => false,
        }
    }
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    if name.is_empty() {
        errors.push("name", "Deal name is required");
    }
}

fn check_value(errors: &mut ValidationErrors, value: f64) {
    if !value.is_finite() || value < 0.0 {
        errors.push("value", "Valid deal value is required");
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
