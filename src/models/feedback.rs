use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Why the user rejected a set of recommendations during refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    TooExpensive,
    TooCheap,
    NotTheirStyle,
    AlreadyHaveSimilar,
    ShowDifferent,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::TooExpensive => "too_expensive",
            RejectionReason::TooCheap => "too_cheap",
            RejectionReason::NotTheirStyle => "not_their_style",
            RejectionReason::AlreadyHaveSimilar => "already_have_similar",
            RejectionReason::ShowDifferent => "show_different",
        }
    }
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One rejected candidate, kept in the session exclusion set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionEvent {
    pub candidate_id: String,
    pub reason: RejectionReason,
    pub rejected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackAction {
    Selected,
    Saved,
    Shared,
    Purchased,
    Rated,
    Dismissed,
}

impl FeedbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::Selected => "selected",
            FeedbackAction::Saved => "saved",
            FeedbackAction::Shared => "shared",
            FeedbackAction::Purchased => "purchased",
            FeedbackAction::Rated => "rated",
            FeedbackAction::Dismissed => "dismissed",
        }
    }
}

/// Write-only feedback record consumed by the analytics side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub recommendation_id: String,
    pub action: FeedbackAction,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub feedback_text: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn validate(&self) -> AppResult<()> {
        if self.recommendation_id.trim().is_empty() {
            return Err(AppError::Validation(
                "recommendation_id cannot be empty".to_string(),
            ));
        }
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(AppError::Validation(format!(
                    "rating must be between 1 and 5 (got {})",
                    rating
                )));
            }
        }
        if self.action == FeedbackAction::Rated && self.rating.is_none() {
            return Err(AppError::Validation(
                "A rated action requires a rating".to_string(),
            ));
        }
        Ok(())
    }
}
