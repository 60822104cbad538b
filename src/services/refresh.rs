/// Refresh rounds
///
/// A refresh consumes `(rejected_ids, reason)` for a delivered triple, records
/// the rejections in the session, narrows the session pool with a
/// reason-specific exclusion predicate and reruns the ranking stages. When the
/// narrowed pool cannot produce a full triple the sources are queried again
/// and the fresh candidates merged in before settling for a partial result.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        validate_vibes, BudgetRange, CandidateRecommendation, PriceTier, RefreshRequest,
        RefreshResponse, RejectionEvent, RejectionReason, VibeTag,
    },
    services::{
        pipeline::{ensure_complete, Ranking, RecommendationPipeline},
        scorer::VibeCache,
        session::{SessionKey, SessionState},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    AwaitingReason,
    Rerolling,
    Delivered,
}

/// One refresh round: `AwaitingReason → Rerolling → Delivered`
#[derive(Debug)]
pub struct RefreshRound {
    state: RoundState,
    reason: Option<RejectionReason>,
}

impl Default for RefreshRound {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshRound {
    pub fn new() -> Self {
        Self {
            state: RoundState::AwaitingReason,
            reason: None,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn receive(&mut self, reason: RejectionReason) -> AppResult<()> {
        match self.state {
            RoundState::AwaitingReason => {
                self.state = RoundState::Rerolling;
                self.reason = Some(reason);
                Ok(())
            }
            state => Err(AppError::Internal(format!(
                "Refresh round cannot take a reason while {:?}",
                state
            ))),
        }
    }

    /// Terminal; returns the reason to echo
    pub fn deliver(&mut self) -> AppResult<RejectionReason> {
        match (self.state, self.reason) {
            (RoundState::Rerolling, Some(reason)) => {
                self.state = RoundState::Delivered;
                Ok(reason)
            }
            (state, _) => Err(AppError::Internal(format!(
                "Refresh round cannot deliver while {:?}",
                state
            ))),
        }
    }
}

/// Attribute filter derived from one round's rejections
///
/// With several rejected candidates the per-candidate rules are unioned, so
/// price bounds take the most restrictive tier. When a price bound is active,
/// unpriced candidates are excluded as well since they cannot be shown to
/// satisfy it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionPredicate {
    at_or_above: Option<PriceTier>,
    at_or_below: Option<PriceTier>,
    vibes: HashSet<VibeTag>,
    merchants: HashSet<String>,
    narrow_categories: HashSet<String>,
}

impl ExclusionPredicate {
    pub fn for_rejection(
        reason: RejectionReason,
        rejected: &[CandidateRecommendation],
        budget: &BudgetRange,
        vibes: &VibeCache,
    ) -> Self {
        let mut predicate = Self::default();
        let tiers = || rejected.iter().filter_map(|c| c.price_tier(budget));

        match reason {
            RejectionReason::TooExpensive => predicate.at_or_above = tiers().min(),
            RejectionReason::TooCheap => predicate.at_or_below = tiers().max(),
            RejectionReason::NotTheirStyle => {
                predicate.vibes = rejected
                    .iter()
                    .filter_map(|c| vibes.get(&c.id).copied().flatten())
                    .collect();
            }
            RejectionReason::AlreadyHaveSimilar => {
                predicate.merchants = rejected.iter().map(|c| c.merchant_key()).collect();
                predicate.narrow_categories =
                    rejected.iter().filter_map(|c| c.narrow_category()).collect();
            }
            RejectionReason::ShowDifferent => {}
        }

        predicate
    }

    pub fn excludes(
        &self,
        candidate: &CandidateRecommendation,
        budget: &BudgetRange,
        vibe: Option<VibeTag>,
    ) -> bool {
        if self.at_or_above.is_some() || self.at_or_below.is_some() {
            let Some(tier) = candidate.price_tier(budget) else {
                return true;
            };
            if self.at_or_above.is_some_and(|bound| tier >= bound)
                || self.at_or_below.is_some_and(|bound| tier <= bound)
            {
                return true;
            }
        }

        if vibe.is_some_and(|v| self.vibes.contains(&v)) {
            return true;
        }

        if self.merchants.contains(&candidate.merchant_key()) {
            return true;
        }

        candidate
            .narrow_category()
            .is_some_and(|c| self.narrow_categories.contains(&c))
    }
}

/// Stage failures that more candidates could fix
fn recoverable(error: &AppError) -> bool {
    matches!(
        error,
        AppError::Aggregation(_) | AppError::FilterExhaustion | AppError::NoLiveCandidates
    )
}

pub struct RefreshOrchestrator {
    pipeline: Arc<RecommendationPipeline>,
}

impl RefreshOrchestrator {
    pub fn new(pipeline: Arc<RecommendationPipeline>) -> Self {
        Self { pipeline }
    }

    pub async fn refresh(&self, request: RefreshRequest) -> AppResult<RefreshResponse> {
        let start = Instant::now();

        if request.rejected_ids.is_empty() {
            return Err(AppError::Validation(
                "At least one rejected id is required".to_string(),
            ));
        }
        if let Some(vibes) = &request.vibe_override {
            validate_vibes(vibes)?;
        }

        let key = SessionKey::new(
            request.profile_ref,
            request.occasion_type,
            request.generation_id,
        );

        // Rounds on one session run one at a time so every rejection is kept
        let sessions = self.pipeline.sessions();
        let lease = sessions.acquire(&key).await?;
        let outcome = self.run_round(key, request, start).await;
        if let Err(e) = sessions.release(&key, lease).await {
            tracing::warn!(session = %key, error = %e, "Failed to release session lease");
        }
        outcome
    }

    /// One round over the session; the caller holds its lease
    async fn run_round(
        &self,
        key: SessionKey,
        request: RefreshRequest,
        start: Instant,
    ) -> AppResult<RefreshResponse> {
        let mut state = self.pipeline.sessions().get(&key).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "Generation {} has no active session",
                request.generation_id
            ))
        })?;
        let profile = self.pipeline.load_profile(request.profile_ref).await?;
        let budget = state.params.budget.clone();

        let mut round = RefreshRound::new();
        round.receive(request.reason)?;

        let rejected = record_rejections(&mut state, &request.rejected_ids, request.reason);

        if let Some(vibes) = request.vibe_override.clone() {
            state.vibe_override = Some(vibes);
        }
        let vibes = state
            .vibe_override
            .clone()
            .unwrap_or_else(|| profile.vibes.clone());

        if request.reason == RejectionReason::NotTheirStyle {
            self.classify_pool_vibes(&mut state).await;
        }
        let predicate =
            ExclusionPredicate::for_rejection(request.reason, &rejected, &budget, &state.vibe_cache);

        let reduced = reduced_pool(&state, &predicate, &budget);
        tracing::info!(
            session = %key,
            reason = %request.reason,
            rejected = rejected.len(),
            pool_size = state.pool.len(),
            reduced_size = reduced.len(),
            "Refresh round started"
        );

        let mut outcome = self
            .pipeline
            .rank(&profile, &vibes, &budget, &reduced, &state.vibe_cache)
            .await;

        let needs_more = match &outcome {
            Ok(ranking) => ranking.triple.partial,
            Err(e) => recoverable(e),
        };

        if needs_more {
            match self.pipeline.aggregator().aggregate(&state.params).await {
                Ok(fresh) => {
                    let added = state.merge_pool(fresh);
                    tracing::info!(session = %key, added = added, "Re-aggregated candidate pool");

                    if added > 0 {
                        if request.reason == RejectionReason::NotTheirStyle {
                            self.classify_pool_vibes(&mut state).await;
                        }
                        let reduced = reduced_pool(&state, &predicate, &budget);
                        let retry = self
                            .pipeline
                            .rank(&profile, &vibes, &budget, &reduced, &state.vibe_cache)
                            .await;
                        outcome = better(outcome, retry);
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %key, error = %e, "Re-aggregation failed, keeping the narrowed pool");
                }
            }
        }

        // Rejections are kept even when the round fails or is refused as partial
        let outcome = outcome.and_then(|ranking| {
            ensure_complete(&ranking.triple, request.allow_partial)?;
            Ok(ranking)
        });
        let ranking = match outcome {
            Ok(ranking) => ranking,
            Err(e) => {
                self.pipeline.sessions().put(&key, &state).await?;
                return Err(e);
            }
        };

        state.delivered = ranking.triple.candidates.clone();
        state.remember_vibes(&ranking.scored);
        state.round += 1;
        self.pipeline.sessions().put(&key, &state).await?;

        let reason = round.deliver()?;

        tracing::info!(
            session = %key,
            round = state.round,
            delivered = ranking.triple.candidates.len(),
            partial = ranking.triple.partial,
            processing_time_ms = start.elapsed().as_millis(),
            "Refresh round delivered"
        );

        Ok(RefreshResponse {
            generation_id: request.generation_id,
            candidates: ranking.triple.candidates,
            partial: ranking.triple.partial,
            reason,
            round: state.round,
        })
    }

    /// Fills the session vibe cache for pool candidates not yet classified
    async fn classify_pool_vibes(&self, state: &mut SessionState) {
        let (ids, texts): (Vec<String>, Vec<String>) = state
            .pool
            .iter()
            .filter(|c| !state.vibe_cache.contains_key(&c.id))
            .map(|c| (c.id.clone(), c.content_text()))
            .unzip();

        if ids.is_empty() {
            return;
        }

        let classifier = self.pipeline.classifier();
        match classifier.classify_vibe_batch(&texts).await {
            Ok(tags) if tags.len() == ids.len() => {
                state.vibe_cache.extend(ids.into_iter().zip(tags));
            }
            Ok(tags) => {
                tracing::warn!(
                    expected = ids.len(),
                    received = tags.len(),
                    "Vibe classification returned the wrong number of results"
                );
            }
            Err(e) => {
                tracing::warn!(
                    classifier = classifier.name(),
                    error = %e,
                    "Pool vibe classification failed, style exclusion limited to known tags"
                );
            }
        }
    }
}

/// Appends one event per rejected id found in the pool and returns those candidates
fn record_rejections(
    state: &mut SessionState,
    rejected_ids: &[String],
    reason: RejectionReason,
) -> Vec<CandidateRecommendation> {
    let now = Utc::now();
    let mut rejected = Vec::with_capacity(rejected_ids.len());

    for id in rejected_ids {
        match state.candidate(id).cloned() {
            Some(candidate) => {
                state.rejections.push(RejectionEvent {
                    candidate_id: id.clone(),
                    reason,
                    rejected_at: now,
                });
                rejected.push(candidate);
            }
            None => {
                tracing::warn!(id = %id, "Rejected id is not in the session pool, ignoring");
            }
        }
    }

    rejected
}

/// Session pool minus every rejected id and everything the predicate excludes
fn reduced_pool(
    state: &SessionState,
    predicate: &ExclusionPredicate,
    budget: &BudgetRange,
) -> Vec<CandidateRecommendation> {
    let excluded = state.excluded_ids();
    state
        .pool
        .iter()
        .filter(|c| !excluded.contains(&c.id))
        .filter(|c| {
            let vibe = state.vibe_cache.get(&c.id).copied().flatten();
            !predicate.excludes(c, budget, vibe)
        })
        .cloned()
        .collect()
}

/// Prefers a full triple, then the larger partial one, then whichever succeeded
fn better(first: AppResult<Ranking>, retry: AppResult<Ranking>) -> AppResult<Ranking> {
    match (first, retry) {
        (Ok(a), Ok(b)) => {
            if b.triple.candidates.len() > a.triple.candidates.len() {
                Ok(b)
            } else {
                Ok(a)
            }
        }
        (Ok(a), Err(e)) => {
            tracing::debug!(error = %e, "Rerun after re-aggregation failed, keeping first result");
            Ok(a)
        }
        (Err(_), Ok(b)) => Ok(b),
        (Err(_), Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::models::candidate::fixtures::candidate;
    use crate::models::{OccasionType, RecommendationCategory::*};
    use crate::models::profile::fixtures::profile;
    use crate::services::availability::LivenessChecker;
    use crate::services::pipeline::fixtures::{
        build_with_checker, catalog, item, no_hints, pipeline, provider,
    };
    use crate::services::session::{MemorySessionStore, SessionStore};

    /// Every URL is live, but each check takes a moment so rounds overlap
    struct SlowChecker;

    #[async_trait::async_trait]
    impl LivenessChecker for SlowChecker {
        async fn is_live(&self, _url: &str) -> AppResult<bool> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(true)
        }
    }

    fn budget() -> BudgetRange {
        // low <= 8334 < mid <= 11667 < high
        BudgetRange::new(5_001, 15_000, "USD")
    }

    fn request(ids: &[&str], reason: RejectionReason) -> RefreshRequest {
        RefreshRequest {
            profile_ref: Uuid::nil(),
            occasion_type: OccasionType::MinorOccasion,
            generation_id: Uuid::nil(),
            rejected_ids: ids.iter().map(|s| s.to_string()).collect(),
            reason,
            vibe_override: None,
            allow_partial: true,
        }
    }

    fn key() -> SessionKey {
        SessionKey::new(Uuid::nil(), OccasionType::MinorOccasion, Uuid::nil())
    }

    async fn seeded(pool: Vec<CandidateRecommendation>) -> Arc<dyn SessionStore> {
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        let mut params = crate::services::session::fixtures::params();
        params.budget = budget();
        let state = SessionState::new(params, pool, vec![], VibeCache::new());
        sessions.put(&key(), &state).await.unwrap();
        sessions
    }

    fn ids(response: &RefreshResponse) -> Vec<&str> {
        response.candidates.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn test_round_transitions() {
        let mut round = RefreshRound::new();
        assert_eq!(round.state(), RoundState::AwaitingReason);
        assert!(round.deliver().is_err());

        round.receive(RejectionReason::TooCheap).unwrap();
        assert_eq!(round.state(), RoundState::Rerolling);
        assert!(round.receive(RejectionReason::TooCheap).is_err());

        assert_eq!(round.deliver().unwrap(), RejectionReason::TooCheap);
        assert_eq!(round.state(), RoundState::Delivered);
        assert!(round.deliver().is_err());
    }

    #[test]
    fn test_too_expensive_excludes_tier_and_above() {
        let rejected = [candidate("r", Gift, Some(10_000), "M")];
        let predicate = ExclusionPredicate::for_rejection(
            RejectionReason::TooExpensive,
            &rejected,
            &budget(),
            &VibeCache::new(),
        );

        let check = |price| predicate.excludes(&candidate("c", Gift, price, "Other"), &budget(), None);
        assert!(!check(Some(6_000)));
        assert!(check(Some(10_000)));
        assert!(check(Some(14_000)));
        assert!(check(None));
    }

    #[test]
    fn test_too_cheap_excludes_tier_and_below() {
        let rejected = [candidate("r", Gift, Some(10_000), "M")];
        let predicate = ExclusionPredicate::for_rejection(
            RejectionReason::TooCheap,
            &rejected,
            &budget(),
            &VibeCache::new(),
        );

        let check = |price| predicate.excludes(&candidate("c", Gift, price, "Other"), &budget(), None);
        assert!(check(Some(6_000)));
        assert!(check(Some(10_000)));
        assert!(!check(Some(14_000)));
    }

    #[test]
    fn test_multiple_price_rejections_use_most_restrictive_tier() {
        let rejected = [
            candidate("a", Gift, Some(14_000), "M1"),
            candidate("b", Gift, Some(10_000), "M2"),
        ];
        let predicate = ExclusionPredicate::for_rejection(
            RejectionReason::TooExpensive,
            &rejected,
            &budget(),
            &VibeCache::new(),
        );
        assert!(predicate.excludes(&candidate("c", Gift, Some(9_000), "M3"), &budget(), None));
        assert!(!predicate.excludes(&candidate("d", Gift, Some(7_000), "M3"), &budget(), None));
    }

    #[test]
    fn test_not_their_style_uses_classified_vibe() {
        let rejected = [candidate("r", Date, Some(9_000), "M")];
        let mut vibes = VibeCache::new();
        vibes.insert("r".to_string(), Some(VibeTag::Romantic));

        let predicate = ExclusionPredicate::for_rejection(
            RejectionReason::NotTheirStyle,
            &rejected,
            &budget(),
            &vibes,
        );
        let other = candidate("c", Gift, Some(9_000), "Other");
        assert!(predicate.excludes(&other, &budget(), Some(VibeTag::Romantic)));
        assert!(!predicate.excludes(&other, &budget(), Some(VibeTag::Vintage)));
        assert!(!predicate.excludes(&other, &budget(), None));
    }

    #[test]
    fn test_already_have_similar_matches_merchant_or_narrow_category() {
        let mut rejected = candidate("r", Gift, Some(9_000), "Clay Studio");
        rejected.provider_category = Some("Ceramics".to_string());
        let predicate = ExclusionPredicate::for_rejection(
            RejectionReason::AlreadyHaveSimilar,
            &[rejected],
            &budget(),
            &VibeCache::new(),
        );

        let same_merchant = candidate("a", Experience, Some(6_000), "clay studio");
        let mut same_category = candidate("b", Gift, Some(6_000), "Other");
        same_category.provider_category = Some("ceramics".to_string());
        let unrelated = candidate("c", Gift, Some(6_000), "Other");

        assert!(predicate.excludes(&same_merchant, &budget(), None));
        assert!(predicate.excludes(&same_category, &budget(), None));
        assert!(!predicate.excludes(&unrelated, &budget(), None));
    }

    #[test]
    fn test_show_different_filters_no_attributes() {
        let rejected = [candidate("r", Gift, Some(9_000), "M")];
        let predicate = ExclusionPredicate::for_rejection(
            RejectionReason::ShowDifferent,
            &rejected,
            &budget(),
            &VibeCache::new(),
        );
        assert_eq!(predicate, ExclusionPredicate::default());
        assert!(!predicate.excludes(&candidate("c", Gift, None, "M"), &budget(), None));
    }

    #[tokio::test]
    async fn test_too_expensive_refresh_delivers_cheaper_triple() {
        let sessions = seeded(catalog()).await;
        let orchestrator = RefreshOrchestrator::new(Arc::new(pipeline(
            provider(vec![], 0),
            Arc::clone(&sessions),
        )));

        let response = orchestrator
            .refresh(request(&["jazz"], RejectionReason::TooExpensive))
            .await
            .unwrap();

        assert_eq!(response.candidates.len(), 3);
        assert!(!response.partial);
        assert_eq!(response.reason, RejectionReason::TooExpensive);
        assert_eq!(response.round, 1);
        for c in &response.candidates {
            assert!(c.candidate.price_minor_units.unwrap() < 14_000);
            assert_ne!(c.candidate.price_tier(&budget()), Some(PriceTier::High));
        }
    }

    #[tokio::test]
    async fn test_rejections_accumulate_across_rounds() {
        let sessions = seeded(catalog()).await;
        let orchestrator = RefreshOrchestrator::new(Arc::new(pipeline(
            provider(vec![], 0),
            Arc::clone(&sessions),
        )));

        let first = orchestrator
            .refresh(request(&["hike"], RejectionReason::ShowDifferent))
            .await
            .unwrap();
        let second = orchestrator
            .refresh(request(&["cook"], RejectionReason::ShowDifferent))
            .await
            .unwrap();

        assert!(!ids(&first).contains(&"hike"));
        assert!(!ids(&second).contains(&"hike"));
        assert!(!ids(&second).contains(&"cook"));
        assert_eq!(second.round, 2);

        let state = sessions.get(&key()).await.unwrap().unwrap();
        assert_eq!(state.rejections.len(), 2);
        assert_eq!(state.delivered, second.candidates);
    }

    #[tokio::test]
    async fn test_narrowed_pool_triggers_reaggregation() {
        let small: Vec<_> = catalog().into_iter().filter(|c| c.id != "golf").take(3).collect();
        let sessions = seeded(small).await;

        let mut extra = catalog();
        extra.push(item("vinyl", Gift, 9_000, "Record Shop", "Jazz vinyl record"));
        let orchestrator = RefreshOrchestrator::new(Arc::new(pipeline(
            provider(extra, 1),
            Arc::clone(&sessions),
        )));

        let response = orchestrator
            .refresh(request(&["wine"], RejectionReason::ShowDifferent))
            .await
            .unwrap();

        assert_eq!(response.candidates.len(), 3);
        assert!(!ids(&response).contains(&"wine"));

        let state = sessions.get(&key()).await.unwrap().unwrap();
        assert!(state.pool.len() > 3);
    }

    #[tokio::test]
    async fn test_not_their_style_excludes_matching_vibe() {
        let sessions = seeded(catalog()).await;
        let orchestrator = RefreshOrchestrator::new(Arc::new(pipeline(
            provider(vec![], 0),
            Arc::clone(&sessions),
        )));

        // "Candlelit jazz dinner" is romantic, and so is "Guided sunset hike"
        let response = orchestrator
            .refresh(request(&["jazz"], RejectionReason::NotTheirStyle))
            .await
            .unwrap();

        assert!(!ids(&response).contains(&"hike"));
        assert!(response
            .candidates
            .iter()
            .all(|c| c.vibe_tag != Some(VibeTag::Romantic)));
    }

    #[tokio::test]
    async fn test_vibe_override_persists_in_session() {
        let sessions = seeded(catalog()).await;
        let orchestrator = RefreshOrchestrator::new(Arc::new(pipeline(
            provider(vec![], 0),
            Arc::clone(&sessions),
        )));

        let mut request = request(&["wine"], RejectionReason::ShowDifferent);
        request.vibe_override = Some(vec![VibeTag::Vintage]);
        orchestrator.refresh(request).await.unwrap();

        let state = sessions.get(&key()).await.unwrap().unwrap();
        assert_eq!(state.vibe_override, Some(vec![VibeTag::Vintage]));
    }

    #[tokio::test]
    async fn test_request_validation_and_missing_session() {
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        let orchestrator = RefreshOrchestrator::new(Arc::new(pipeline(
            provider(vec![], 0),
            sessions,
        )));

        let empty = orchestrator
            .refresh(request(&[], RejectionReason::ShowDifferent))
            .await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let mut too_many = request(&["a"], RejectionReason::NotTheirStyle);
        too_many.vibe_override = Some(VibeTag::ALL[..5].to_vec());
        assert!(matches!(
            orchestrator.refresh(too_many).await,
            Err(AppError::Validation(_))
        ));

        let missing = orchestrator
            .refresh(request(&["a"], RejectionReason::ShowDifferent))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_rounds_keep_every_rejection() {
        let sessions = seeded(catalog()).await;
        let orchestrator = RefreshOrchestrator::new(Arc::new(build_with_checker(
            profile(),
            no_hints(),
            provider(vec![], 0),
            Arc::new(SlowChecker),
            Arc::clone(&sessions),
        )));

        let (first, second) = tokio::join!(
            orchestrator.refresh(request(&["hike"], RejectionReason::ShowDifferent)),
            orchestrator.refresh(request(&["jazz"], RejectionReason::ShowDifferent)),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        let state = sessions.get(&key()).await.unwrap().unwrap();
        let excluded = state.excluded_ids();
        assert!(excluded.contains("hike"));
        assert!(excluded.contains("jazz"));
        assert_eq!(state.round, 2);

        let mut rounds = [first.round, second.round];
        rounds.sort();
        assert_eq!(rounds, [1, 2]);

        let later = if first.round == 2 { &first } else { &second };
        assert!(!ids(later).contains(&"hike"));
        assert!(!ids(later).contains(&"jazz"));
    }

    #[tokio::test]
    async fn test_refused_partial_round_is_not_recorded_as_delivered() {
        let small: Vec<_> = catalog()
            .into_iter()
            .filter(|c| ["wine", "art", "cook"].contains(&c.id.as_str()))
            .collect();
        let sessions = seeded(small.clone()).await;
        let orchestrator = RefreshOrchestrator::new(Arc::new(pipeline(
            provider(small, 1),
            Arc::clone(&sessions),
        )));

        let mut strict = request(&["cook"], RejectionReason::ShowDifferent);
        strict.allow_partial = false;
        let result = orchestrator.refresh(strict).await;
        assert!(matches!(result, Err(AppError::PartialResult { found: 2 })));

        let state = sessions.get(&key()).await.unwrap().unwrap();
        assert_eq!(state.round, 0);
        assert!(state.delivered.is_empty());
        assert!(state.excluded_ids().contains("cook"));
    }
}
