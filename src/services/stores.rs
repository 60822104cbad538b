/// Collaborator stores: partner profiles, hints and the feedback sink
///
/// Postgres implementations use runtime-checked `query_as` so the crate builds
/// without a live database.
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        BudgetRange, BudgetTiers, FeedbackRecord, Hint, LoveLanguage, PreferenceProfile, VibeTag,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// `NotFound` when no profile exists for the reference
    async fn get(&self, profile_ref: Uuid) -> AppResult<PreferenceProfile>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HintIndex: Send + Sync {
    /// Up to `k` hints for the profile with similarity >= `threshold`, most similar first
    async fn query_similar(
        &self,
        text: &str,
        profile_ref: Uuid,
        k: usize,
        threshold: f32,
    ) -> AppResult<Vec<Hint>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn record(&self, feedback: &FeedbackRecord) -> AppResult<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    display_name: String,
    location: Option<String>,
    likes: Vec<String>,
    dislikes: Vec<String>,
    vibes: Vec<String>,
    primary_love_language: String,
    secondary_love_language: String,
    currency: String,
    just_because_min: i64,
    just_because_max: i64,
    minor_occasion_min: i64,
    minor_occasion_max: i64,
    major_milestone_min: i64,
    major_milestone_max: i64,
}

impl TryFrom<ProfileRow> for PreferenceProfile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> AppResult<Self> {
        let vibes = row
            .vibes
            .iter()
            .map(|v| {
                VibeTag::parse(v)
                    .ok_or_else(|| AppError::Validation(format!("Unknown vibe tag '{}'", v)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let love_language = |value: &str| {
            LoveLanguage::parse(value)
                .ok_or_else(|| AppError::Validation(format!("Unknown love language '{}'", value)))
        };

        Ok(PreferenceProfile {
            id: row.id,
            display_name: row.display_name,
            location: row.location,
            likes: row.likes,
            dislikes: row.dislikes,
            vibes,
            budget_tiers: BudgetTiers {
                just_because: BudgetRange::new(row.just_because_min, row.just_because_max, &row.currency),
                minor_occasion: BudgetRange::new(
                    row.minor_occasion_min,
                    row.minor_occasion_max,
                    &row.currency,
                ),
                major_milestone: BudgetRange::new(
                    row.major_milestone_min,
                    row.major_milestone_max,
                    &row.currency,
                ),
            },
            primary_love_language: love_language(&row.primary_love_language)?,
            secondary_love_language: love_language(&row.secondary_love_language)?,
        })
    }
}

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileStore for PgProfileStore {
    async fn get(&self, profile_ref: Uuid) -> AppResult<PreferenceProfile> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, display_name, location, likes, dislikes, vibes,
                   primary_love_language, secondary_love_language, currency,
                   just_because_min, just_because_max,
                   minor_occasion_min, minor_occasion_max,
                   major_milestone_min, major_milestone_max
            FROM partner_profiles
            WHERE id = $1
            "#,
        )
        .bind(profile_ref)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", profile_ref)))?;

        row.try_into()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HintRow {
    id: Uuid,
    hint_text: String,
    embedding: Option<Vec<f32>>,
    score: f32,
}

/// Trigram similarity over the profile's hints (pg_trgm)
pub struct PgHintIndex {
    pool: PgPool,
}

impl PgHintIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HintIndex for PgHintIndex {
    async fn query_similar(
        &self,
        text: &str,
        profile_ref: Uuid,
        k: usize,
        threshold: f32,
    ) -> AppResult<Vec<Hint>> {
        let rows = sqlx::query_as::<_, HintRow>(
            r#"
            SELECT id, hint_text, embedding, similarity(hint_text, $1) AS score
            FROM hints
            WHERE profile_id = $2 AND similarity(hint_text, $1) >= $3
            ORDER BY score DESC, created_at DESC
            LIMIT $4
            "#,
        )
        .bind(text)
        .bind(profile_ref)
        .bind(threshold)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Hint {
                id: row.id,
                text: row.hint_text,
                embedding: row.embedding,
                score: Some(row.score),
            })
            .collect())
    }
}

pub struct PgFeedbackSink {
    pool: PgPool,
}

impl PgFeedbackSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FeedbackSink for PgFeedbackSink {
    async fn record(&self, feedback: &FeedbackRecord) -> AppResult<()> {
        let recorded_at: DateTime<Utc> = feedback.timestamp;

        sqlx::query(
            r#"
            INSERT INTO recommendation_feedback
                (recommendation_id, action, rating, feedback_text, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&feedback.recommendation_id)
        .bind(feedback.action.as_str())
        .bind(feedback.rating.map(i16::from))
        .bind(&feedback.feedback_text)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            recommendation_id = %feedback.recommendation_id,
            action = feedback.action.as_str(),
            "Feedback recorded"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ProfileRow {
        ProfileRow {
            id: Uuid::nil(),
            display_name: "Sam".to_string(),
            location: Some("Austin".to_string()),
            likes: vec!["Cooking".into(), "Wine".into(), "Music".into(), "Hiking".into(), "Art".into()],
            dislikes: vec!["Golf".into(), "Gaming".into(), "Sports".into(), "Fitness".into(), "Camping".into()],
            vibes: vec!["romantic".into(), "minimalist".into()],
            primary_love_language: "quality_time".to_string(),
            secondary_love_language: "receiving_gifts".to_string(),
            currency: "USD".to_string(),
            just_because_min: 0,
            just_because_max: 5_000,
            minor_occasion_min: 5_001,
            minor_occasion_max: 15_000,
            major_milestone_min: 15_001,
            major_milestone_max: 50_000,
        }
    }

    #[test]
    fn test_row_converts_to_valid_profile() {
        let profile = PreferenceProfile::try_from(row()).unwrap();
        assert_eq!(profile.vibes, vec![VibeTag::Romantic, VibeTag::Minimalist]);
        assert_eq!(profile.primary_love_language, LoveLanguage::QualityTime);
        assert_eq!(profile.budget_tiers.minor_occasion.max_amount, 15_000);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_row_with_unknown_vibe_is_validation_error() {
        let mut row = row();
        row.vibes.push("cottagecore".to_string());
        assert!(matches!(
            PreferenceProfile::try_from(row),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_row_with_unknown_love_language_is_validation_error() {
        let mut row = row();
        row.secondary_love_language = "telepathy".to_string();
        assert!(matches!(
            PreferenceProfile::try_from(row),
            Err(AppError::Validation(_))
        ));
    }
}
