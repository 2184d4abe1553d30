//! # Project Plan and Budget
//!
//! The two documents an applicant prepares after the wallet check. Each
//! stage of the flow exits only once its document is ready.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use subsi_vc::SubmissionDocument;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("budget line {index} has an empty description")]
    EmptyBudgetLine { index: usize },

    #[error("budget total overflows")]
    BudgetOverflow,
}

// ─── Project Plan ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPlan {
    #[serde(default)]
    pub countries: String,
    #[serde(default)]
    pub project_title: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl ProjectPlan {
    const FIELD_COUNT: u32 = 4;

    fn filled(&self) -> u32 {
        [
            !self.countries.trim().is_empty(),
            !self.project_title.trim().is_empty(),
            self.start_date.is_some(),
            self.end_date.is_some(),
        ]
        .into_iter()
        .filter(|f| *f)
        .count() as u32
    }

    /// Share of filled fields, 0 to 100.
    pub fn progress_percent(&self) -> u8 {
        (self.filled() * 100 / Self::FIELD_COUNT) as u8
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(PlanError::EndBeforeStart { start, end });
            }
        }
        Ok(())
    }

    /// All fields filled and dates in order.
    pub fn is_complete(&self) -> bool {
        self.filled() == Self::FIELD_COUNT && self.validate().is_ok()
    }

    pub fn to_document(&self) -> SubmissionDocument {
        SubmissionDocument {
            name: "projectplan".to_string(),
            media_type: "application/json".to_string(),
            content: json!({
                "countries": self.countries,
                "projectTitle": self.project_title,
                "startDate": self.start_date.map(|d| d.to_string()),
                "endDate": self.end_date.map(|d| d.to_string()),
            }),
        }
    }
}

// ─── Budget ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLine {
    pub description: String,
    /// Amount in euro cents.
    pub amount_cents: u64,
}

/// A budget, either uploaded as a file or composed line by line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum Budget {
    #[serde(rename_all = "camelCase")]
    Uploaded { file_name: String, media_type: String },
    Composed { lines: Vec<BudgetLine> },
}

impl Budget {
    pub fn validate(&self) -> Result<(), PlanError> {
        if let Self::Composed { lines } = self {
            if let Some(index) = lines.iter().position(|l| l.description.trim().is_empty()) {
                return Err(PlanError::EmptyBudgetLine { index });
            }
            self.total_cents()?;
        }
        Ok(())
    }

    /// Sum of composed lines; zero for an uploaded budget.
    pub fn total_cents(&self) -> Result<u64, PlanError> {
        match self {
            Self::Uploaded { .. } => Ok(0),
            Self::Composed { lines } => lines
                .iter()
                .try_fold(0u64, |acc, l| acc.checked_add(l.amount_cents))
                .ok_or(PlanError::BudgetOverflow),
        }
    }

    pub fn is_ready(&self) -> bool {
        if self.validate().is_err() {
            return false;
        }
        match self {
            Self::Uploaded { file_name, .. } => !file_name.trim().is_empty(),
            Self::Composed { lines } => !lines.is_empty() && self.total_cents().is_ok_and(|t| t > 0),
        }
    }

    pub fn to_document(&self) -> SubmissionDocument {
        match self {
            Self::Uploaded { file_name, media_type } => SubmissionDocument {
                name: file_name.clone(),
                media_type: media_type.clone(),
                content: serde_json::Value::Null,
            },
            Self::Composed { lines } => SubmissionDocument {
                name: "begroting".to_string(),
                media_type: "application/json".to_string(),
                content: json!({ "lines": lines, "totalCents": self.total_cents().unwrap_or(0) }),
            },
        }
    }
}
