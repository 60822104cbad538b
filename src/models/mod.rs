use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod candidate;
pub mod feedback;
pub mod profile;

pub use candidate::{
    normalize_text, CandidateRecommendation, CandidateSource, PriceTier, RecommendationCategory,
    RecommendationTriple, ScoredCandidate,
};
pub use feedback::{FeedbackAction, FeedbackRecord, RejectionEvent, RejectionReason};
pub use profile::{
    canonical_interest, validate_vibes, BudgetRange, BudgetTiers, LoveLanguage, OccasionType,
    PreferenceProfile, VibeTag, INTEREST_VOCABULARY,
};

/// Free-text partner observation returned by the hint index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Similarity to the query, when the hint came from a similarity search
    #[serde(default)]
    pub score: Option<f32>,
}

/// Upcoming milestone the recommendation is for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneContext {
    pub name: String,
    #[serde(default)]
    pub date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Provider-agnostic search parameters for one aggregation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub interests: Vec<String>,
    pub vibes: Vec<VibeTag>,
    /// Hint texts retrieved for this profile, most similar first
    pub keywords: Vec<String>,
    pub budget: BudgetRange,
    pub location: Option<String>,
    pub occasion: OccasionType,
    /// Result cap for each provider
    pub limit: usize,
}

impl SearchParams {
    /// Short keyword query most search APIs handle well
    pub fn query(&self) -> String {
        self.interests
            .iter()
            .take(2)
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// API request/response types
// ============================================================================

fn default_allow_partial() -> bool {
    true
}

/// Request for a fresh Choice-of-Three
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub profile_ref: Uuid,
    #[serde(default)]
    pub milestone_context: Option<MilestoneContext>,
    pub occasion_type: OccasionType,
    /// When false, a result with fewer than three candidates is returned as an error
    #[serde(default = "default_allow_partial")]
    pub allow_partial: bool,
}

/// Request to replace a delivered triple after rejection
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub profile_ref: Uuid,
    pub occasion_type: OccasionType,
    pub generation_id: Uuid,
    pub rejected_ids: Vec<String>,
    pub reason: RejectionReason,
    #[serde(default)]
    pub vibe_override: Option<Vec<VibeTag>>,
    #[serde(default = "default_allow_partial")]
    pub allow_partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub generation_id: Uuid,
    pub candidates: Vec<ScoredCandidate>,
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub generation_id: Uuid,
    pub candidates: Vec<ScoredCandidate>,
    pub partial: bool,
    pub reason: RejectionReason,
    pub round: u32,
}
