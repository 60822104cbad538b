use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{BudgetRange, VibeTag};

/// External inventory provider a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Shopify,
    Etsy,
    Ticketmaster,
    Yelp,
}

impl CandidateSource {
    /// Lower value wins when two providers return the same item
    pub fn priority(&self) -> u8 {
        match self {
            CandidateSource::Shopify => 0,
            CandidateSource::Etsy => 1,
            CandidateSource::Ticketmaster => 2,
            CandidateSource::Yelp => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Shopify => "shopify",
            CandidateSource::Etsy => "etsy",
            CandidateSource::Ticketmaster => "ticketmaster",
            CandidateSource::Yelp => "yelp",
        }
    }
}

impl Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Gift,
    Experience,
    Date,
}

/// Price bucket: the occasion's budget range split into equal thirds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Low,
    Mid,
    High,
}

impl PriceTier {
    pub fn for_amount(amount: i64, budget: &BudgetRange) -> Self {
        let span = (budget.max_amount - budget.min_amount).max(0);
        let low_ceiling = budget.min_amount + span / 3;
        let mid_ceiling = budget.min_amount + (2 * span) / 3;

        if amount <= low_ceiling {
            PriceTier::Low
        } else if amount <= mid_ceiling {
            PriceTier::Mid
        } else {
            PriceTier::High
        }
    }
}

/// Normalized external item, produced once per aggregation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecommendation {
    pub id: String,
    pub source: CandidateSource,
    pub category: RecommendationCategory,
    pub title: String,
    pub description: Option<String>,
    pub price_minor_units: Option<i64>,
    pub currency: String,
    pub external_url: String,
    pub image_url: Option<String>,
    pub merchant_name: Option<String>,
    pub location: Option<String>,
    /// The provider's own narrow category label (e.g. "Ceramics", "Jazz")
    pub provider_category: Option<String>,
}

impl CandidateRecommendation {
    /// Text handed to the content classifier
    pub fn content_text(&self) -> String {
        let mut text = self.title.clone();
        if let Some(category) = &self.provider_category {
            text.push_str(". ");
            text.push_str(category);
        }
        if let Some(description) = &self.description {
            text.push_str(". ");
            text.push_str(description);
        }
        text
    }

    /// Identity used for merchant diversity: merchant name, else the URL host
    pub fn merchant_key(&self) -> String {
        if let Some(name) = self.merchant_name.as_deref().map(normalize_text) {
            if !name.is_empty() {
                return name;
            }
        }

        reqwest::Url::parse(&self.external_url)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| self.id.clone())
    }

    /// Key used to collapse the same item returned by several providers
    pub fn dedup_key(&self) -> (String, String) {
        (
            normalize_text(&self.title),
            self.merchant_name
                .as_deref()
                .map(normalize_text)
                .unwrap_or_default(),
        )
    }

    pub fn price_tier(&self, budget: &BudgetRange) -> Option<PriceTier> {
        self.price_minor_units
            .map(|amount| PriceTier::for_amount(amount, budget))
    }

    pub fn narrow_category(&self) -> Option<String> {
        self.provider_category
            .as_deref()
            .map(normalize_text)
            .filter(|c| !c.is_empty())
    }
}

/// Lowercases and collapses everything that is not alphanumeric into single spaces
pub fn normalize_text(value: &str) -> String {
    value
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Candidate with the scores computed by the filter and scorer stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: CandidateRecommendation,
    #[serde(default)]
    pub vibe_tag: Option<VibeTag>,
    pub interest_score: f64,
    pub vibe_score: f64,
    pub love_language_score: f64,
    pub final_score: f64,
}

impl ScoredCandidate {
    /// Wraps a filtered candidate before the scorer has run
    pub fn from_interest(candidate: CandidateRecommendation, interest_score: f64) -> Self {
        Self {
            candidate,
            vibe_tag: None,
            interest_score,
            vibe_score: 0.0,
            love_language_score: 0.0,
            final_score: interest_score,
        }
    }

    pub fn id(&self) -> &str {
        &self.candidate.id
    }
}

/// The unit of output: up to three ranked candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationTriple {
    pub candidates: Vec<ScoredCandidate>,
    pub partial: bool,
}
