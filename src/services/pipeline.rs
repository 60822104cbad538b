use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::{
    config::PipelineSettings,
    error::{AppError, AppResult},
    models::{
        BudgetRange, CandidateRecommendation, GenerateRequest, GenerateResponse, MilestoneContext,
        PreferenceProfile, RecommendationTriple, ScoredCandidate, SearchParams, VibeTag,
    },
    services::{
        aggregator::SourceAggregator,
        availability::{AvailabilityVerifier, LivenessChecker},
        classifier::ContentClassifier,
        filter::PreferenceFilter,
        scorer::{VibeCache, VibeScorer},
        selector::DiversitySelector,
        session::{SessionKey, SessionState, SessionStore},
        stores::{HintIndex, ProfileStore},
    },
};

/// Result of one Filter → Scorer → Selector → Verifier pass
#[derive(Debug, Clone)]
pub struct Ranking {
    pub triple: RecommendationTriple,
    /// The scored pool the triple was drawn from, final score descending
    pub scored: Vec<ScoredCandidate>,
}

/// Turns a partner profile into a verified Choice-of-Three
pub struct RecommendationPipeline {
    profiles: Arc<dyn ProfileStore>,
    hints: Arc<dyn HintIndex>,
    aggregator: SourceAggregator,
    classifier: Arc<dyn ContentClassifier>,
    filter: PreferenceFilter,
    scorer: VibeScorer,
    verifier: AvailabilityVerifier,
    sessions: Arc<dyn SessionStore>,
    settings: PipelineSettings,
}

impl RecommendationPipeline {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        hints: Arc<dyn HintIndex>,
        aggregator: SourceAggregator,
        classifier: Arc<dyn ContentClassifier>,
        checker: Arc<dyn LivenessChecker>,
        sessions: Arc<dyn SessionStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            profiles,
            hints,
            aggregator,
            filter: PreferenceFilter::new(Arc::clone(&classifier), settings.filtered_pool_size),
            scorer: VibeScorer::new(Arc::clone(&classifier)),
            verifier: AvailabilityVerifier::new(checker, &settings),
            classifier,
            sessions,
            settings,
        }
    }

    pub fn aggregator(&self) -> &SourceAggregator {
        &self.aggregator
    }

    pub fn classifier(&self) -> &Arc<dyn ContentClassifier> {
        &self.classifier
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Generates a fresh triple and opens a refresh session for it
    pub async fn generate(&self, request: GenerateRequest) -> AppResult<GenerateResponse> {
        let start = Instant::now();

        let profile = self.load_profile(request.profile_ref).await?;
        let budget = profile.budget_tiers.for_occasion(request.occasion_type).clone();
        let keywords = self
            .hint_keywords(&profile, request.milestone_context.as_ref())
            .await;

        let params = SearchParams {
            interests: profile.likes.clone(),
            vibes: profile.vibes.clone(),
            keywords,
            budget: budget.clone(),
            location: profile.location.clone(),
            occasion: request.occasion_type,
            limit: self.settings.pool_target_max,
        };

        let pool = self.aggregator.aggregate(&params).await?;
        let ranking = self
            .rank(&profile, &profile.vibes, &budget, &pool, &VibeCache::new())
            .await?;

        ensure_complete(&ranking.triple, request.allow_partial)?;

        let generation_id = Uuid::new_v4();
        let key = SessionKey::new(request.profile_ref, request.occasion_type, generation_id);
        let mut state = SessionState::new(
            params,
            pool,
            ranking.triple.candidates.clone(),
            VibeCache::new(),
        );
        state.remember_vibes(&ranking.scored);
        self.sessions.put(&key, &state).await?;

        tracing::info!(
            generation_id = %generation_id,
            occasion = %request.occasion_type,
            pool_size = state.pool.len(),
            delivered = ranking.triple.candidates.len(),
            partial = ranking.triple.partial,
            processing_time_ms = start.elapsed().as_millis(),
            "Recommendations generated"
        );

        Ok(GenerateResponse {
            generation_id,
            candidates: ranking.triple.candidates,
            partial: ranking.triple.partial,
        })
    }

    /// Loads a profile and rejects it before any stage runs if it is malformed
    pub async fn load_profile(&self, profile_ref: Uuid) -> AppResult<PreferenceProfile> {
        let profile = self.profiles.get(profile_ref).await?;
        profile.validate()?;
        Ok(profile)
    }

    /// Runs the ranking stages over `pool`
    ///
    /// `vibes` is the vibe set to boost (the profile's, or a session override).
    /// `known_vibes` carries tags classified in earlier rounds.
    pub async fn rank(
        &self,
        profile: &PreferenceProfile,
        vibes: &[VibeTag],
        budget: &BudgetRange,
        pool: &[CandidateRecommendation],
        known_vibes: &VibeCache,
    ) -> AppResult<Ranking> {
        if pool.is_empty() {
            return Err(AppError::Aggregation(
                "No candidates remain to rank".to_string(),
            ));
        }

        let filtered = self.filter.filter(profile, pool).await?;
        let scored = self
            .scorer
            .score(profile, vibes, filtered, known_vibes)
            .await;

        let selector = DiversitySelector::new(budget.clone());
        let selection = selector.select(&scored);
        let triple = self.verifier.verify(selection, &scored, &selector).await?;

        Ok(Ranking { triple, scored })
    }

    /// Hint texts similar to the profile's likes and the milestone, most similar first
    ///
    /// The hint index only enriches the search; a failure is logged and skipped.
    async fn hint_keywords(
        &self,
        profile: &PreferenceProfile,
        milestone: Option<&MilestoneContext>,
    ) -> Vec<String> {
        let mut query = profile.likes.join(" ");
        if let Some(milestone) = milestone {
            query.push(' ');
            query.push_str(&milestone.name);
            if let Some(notes) = &milestone.notes {
                query.push(' ');
                query.push_str(notes);
            }
        }

        match self
            .hints
            .query_similar(
                &query,
                profile.id,
                self.settings.hint_k,
                self.settings.hint_threshold,
            )
            .await
        {
            Ok(hints) => {
                tracing::debug!(hints = hints.len(), "Hint keywords retrieved");
                hints.into_iter().map(|h| h.text).collect()
            }
            Err(e) => {
                tracing::warn!(profile_id = %profile.id, error = %e, "Hint retrieval failed, continuing without hints");
                Vec::new()
            }
        }
    }
}

/// A short triple is only an error when the caller asked for a full one
pub fn ensure_complete(triple: &RecommendationTriple, allow_partial: bool) -> AppResult<()> {
    if triple.partial && !allow_partial {
        return Err(AppError::PartialResult {
            found: triple.candidates.len(),
        });
    }
    Ok(())
}
