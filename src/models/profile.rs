use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Number of like and dislike categories a profile must carry
pub const INTEREST_SLOTS: usize = 5;

/// Maximum number of vibe tags a profile may select
pub const MAX_VIBES: usize = 4;

/// Fixed interest vocabulary shared by likes and dislikes
pub const INTEREST_VOCABULARY: [&str; 40] = [
    "Travel",
    "Cooking",
    "Baking",
    "Wine",
    "Coffee",
    "Tea",
    "Fitness",
    "Yoga",
    "Running",
    "Hiking",
    "Camping",
    "Cycling",
    "Golf",
    "Tennis",
    "Swimming",
    "Skiing",
    "Music",
    "Concerts",
    "Theater",
    "Movies",
    "Reading",
    "Writing",
    "Art",
    "Photography",
    "Fashion",
    "Beauty",
    "Gardening",
    "Plants",
    "Gaming",
    "Technology",
    "Sports",
    "Dancing",
    "Pets",
    "Crafts",
    "Board Games",
    "History",
    "Science",
    "Outdoors",
    "Spa",
    "Food",
];

/// Returns the canonical vocabulary entry for a label, ignoring case and surrounding whitespace
pub fn canonical_interest(label: &str) -> Option<&'static str> {
    let label = label.trim();
    INTEREST_VOCABULARY
        .iter()
        .copied()
        .find(|entry| entry.eq_ignore_ascii_case(label))
}

/// Aesthetic descriptor used for both partner taste and candidate content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibeTag {
    QuietLuxury,
    StreetUrban,
    Outdoorsy,
    Vintage,
    Minimalist,
    Bohemian,
    Romantic,
    Adventurous,
}

impl VibeTag {
    pub const ALL: [VibeTag; 8] = [
        VibeTag::QuietLuxury,
        VibeTag::StreetUrban,
        VibeTag::Outdoorsy,
        VibeTag::Vintage,
        VibeTag::Minimalist,
        VibeTag::Bohemian,
        VibeTag::Romantic,
        VibeTag::Adventurous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VibeTag::QuietLuxury => "quiet_luxury",
            VibeTag::StreetUrban => "street_urban",
            VibeTag::Outdoorsy => "outdoorsy",
            VibeTag::Vintage => "vintage",
            VibeTag::Minimalist => "minimalist",
            VibeTag::Bohemian => "bohemian",
            VibeTag::Romantic => "romantic",
            VibeTag::Adventurous => "adventurous",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(value))
    }
}

impl Display for VibeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Affection style; a profile carries a distinct primary and secondary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoveLanguage {
    ReceivingGifts,
    QualityTime,
    ActsOfService,
    WordsOfAffirmation,
    PhysicalTouch,
}

impl LoveLanguage {
    pub const ALL: [LoveLanguage; 5] = [
        LoveLanguage::ReceivingGifts,
        LoveLanguage::QualityTime,
        LoveLanguage::ActsOfService,
        LoveLanguage::WordsOfAffirmation,
        LoveLanguage::PhysicalTouch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoveLanguage::ReceivingGifts => "receiving_gifts",
            LoveLanguage::QualityTime => "quality_time",
            LoveLanguage::ActsOfService => "acts_of_service",
            LoveLanguage::WordsOfAffirmation => "words_of_affirmation",
            LoveLanguage::PhysicalTouch => "physical_touch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|language| language.as_str().eq_ignore_ascii_case(value))
    }
}

/// Occasion scale, which also selects the budget tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccasionType {
    JustBecause,
    MinorOccasion,
    MajorMilestone,
}

impl OccasionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccasionType::JustBecause => "just_because",
            OccasionType::MinorOccasion => "minor_occasion",
            OccasionType::MajorMilestone => "major_milestone",
        }
    }
}

impl Display for OccasionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Amount range in minor currency units (e.g., 2500 = $25.00)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min_amount: i64,
    pub max_amount: i64,
    pub currency: String,
}

impl BudgetRange {
    pub fn new(min_amount: i64, max_amount: i64, currency: &str) -> Self {
        Self {
            min_amount,
            max_amount,
            currency: currency.to_string(),
        }
    }

    pub fn contains(&self, amount: i64) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }
}

/// Budget table with one range per occasion tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetTiers {
    pub just_because: BudgetRange,
    pub minor_occasion: BudgetRange,
    pub major_milestone: BudgetRange,
}

impl BudgetTiers {
    pub fn for_occasion(&self, occasion: OccasionType) -> &BudgetRange {
        match occasion {
            OccasionType::JustBecause => &self.just_because,
            OccasionType::MinorOccasion => &self.minor_occasion,
            OccasionType::MajorMilestone => &self.major_milestone,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (OccasionType, &BudgetRange)> {
        [
            (OccasionType::JustBecause, &self.just_because),
            (OccasionType::MinorOccasion, &self.minor_occasion),
            (OccasionType::MajorMilestone, &self.major_milestone),
        ]
        .into_iter()
    }
}

/// Partner preference profile, owned by the profile store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub id: Uuid,
    pub display_name: String,
    /// City used by location-bound providers (restaurants, events)
    pub location: Option<String>,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    pub vibes: Vec<VibeTag>,
    pub budget_tiers: BudgetTiers,
    pub primary_love_language: LoveLanguage,
    pub secondary_love_language: LoveLanguage,
}

impl PreferenceProfile {
    /// Checks every structural invariant before the pipeline runs
    pub fn validate(&self) -> AppResult<()> {
        check_interest_set("likes", &self.likes)?;
        check_interest_set("dislikes", &self.dislikes)?;

        let likes: HashSet<&str> = self.likes.iter().filter_map(|l| canonical_interest(l)).collect();
        if let Some(overlap) = self
            .dislikes
            .iter()
            .filter_map(|d| canonical_interest(d))
            .find(|d| likes.contains(d))
        {
            return Err(AppError::Validation(format!(
                "'{}' cannot be both a like and a dislike",
                overlap
            )));
        }

        validate_vibes(&self.vibes)?;

        for (occasion, range) in self.budget_tiers.iter() {
            if range.min_amount < 0 || range.min_amount > range.max_amount {
                return Err(AppError::Validation(format!(
                    "Budget tier {} must satisfy 0 <= min <= max (got {}..{})",
                    occasion, range.min_amount, range.max_amount
                )));
            }
        }

        if self.primary_love_language == self.secondary_love_language {
            return Err(AppError::Validation(
                "Primary and secondary love languages must differ".to_string(),
            ));
        }

        Ok(())
    }
}

/// Validates a vibe selection (1–4 distinct tags)
pub fn validate_vibes(vibes: &[VibeTag]) -> AppResult<()> {
    if vibes.is_empty() || vibes.len() > MAX_VIBES {
        return Err(AppError::Validation(format!(
            "Between 1 and {} vibes are required (got {})",
            MAX_VIBES,
            vibes.len()
        )));
    }
    let unique: HashSet<&VibeTag> = vibes.iter().collect();
    if unique.len() != vibes.len() {
        return Err(AppError::Validation("Vibes must not repeat".to_string()));
    }
    Ok(())
}

fn check_interest_set(field: &str, values: &[String]) -> AppResult<()> {
    if values.len() != INTEREST_SLOTS {
        return Err(AppError::Validation(format!(
            "Exactly {} {} are required (got {})",
            INTEREST_SLOTS,
            field,
            values.len()
        )));
    }

    let mut seen = HashSet::new();
    for value in values {
        let canonical = canonical_interest(value).ok_or_else(|| {
            AppError::Validation(format!("Unknown interest category in {}: '{}'", field, value))
        })?;
        if !seen.insert(canonical) {
            return Err(AppError::Validation(format!(
                "Duplicate interest category in {}: '{}'",
                field, canonical
            )));
        }
    }

    Ok(())
}
