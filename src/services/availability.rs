use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client as HttpClient, StatusCode};

use crate::{
    cached,
    config::PipelineSettings,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{RecommendationTriple, ScoredCandidate},
    services::selector::{DiversitySelector, Selection, TRIPLE_SIZE},
};

const LIVENESS_CACHE_TTL: u64 = 600; // 10 minutes in seconds

/// Confirms that an external destination still resolves
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LivenessChecker: Send + Sync {
    async fn is_live(&self, url: &str) -> AppResult<bool>;
}

/// HEAD probe with a GET fallback, memoized in Redis when a cache is given
pub struct HttpLivenessChecker {
    http_client: HttpClient,
    cache: Option<Cache>,
}

impl HttpLivenessChecker {
    pub fn new(http_client: HttpClient, cache: Option<Cache>) -> Self {
        Self { http_client, cache }
    }

    async fn probe(&self, url: &str) -> AppResult<bool> {
        let mut status = self.http_client.head(url).send().await?.status();

        // Some storefronts refuse HEAD outright
        if matches!(
            status,
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::FORBIDDEN | StatusCode::NOT_IMPLEMENTED
        ) {
            status = self.http_client.get(url).send().await?.status();
        }

        let live = status.is_success() || status.is_redirection();
        tracing::debug!(url = %url, status = %status, live = live, "Liveness probe");
        Ok(live)
    }
}

#[async_trait::async_trait]
impl LivenessChecker for HttpLivenessChecker {
    async fn is_live(&self, url: &str) -> AppResult<bool> {
        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::Liveness(url.to_string()),
                LIVENESS_CACHE_TTL,
                self.probe(url)
            ),
            None => self.probe(url).await,
        }
    }
}

/// Verifies the selected triple and replaces dead picks from the ranked pool
pub struct AvailabilityVerifier {
    checker: Arc<dyn LivenessChecker>,
    timeout: Duration,
    retries: usize,
    max_replacements: usize,
}

impl AvailabilityVerifier {
    pub fn new(checker: Arc<dyn LivenessChecker>, settings: &PipelineSettings) -> Self {
        Self {
            checker,
            timeout: settings.liveness_timeout,
            retries: settings.liveness_retries,
            max_replacements: settings.max_replacements,
        }
    }

    /// Confirms the selection, returning a triple flagged `partial` when fewer
    /// than three picks could be confirmed
    ///
    /// `ranked` is the scored pool the selection came from; replacements are
    /// drawn from it in rank order under the selector's diversity ladder.
    pub async fn verify(
        &self,
        selection: Selection,
        ranked: &[ScoredCandidate],
        selector: &DiversitySelector,
    ) -> AppResult<RecommendationTriple> {
        let start = Instant::now();
        let mut tried: HashSet<String> = selection.picks.iter().map(|p| p.id().to_string()).collect();

        // Initial picks are checked concurrently, one future per pick
        let checks = selection
            .picks
            .iter()
            .map(|pick| self.check(&pick.candidate.external_url));
        let verdicts = futures::future::join_all(checks).await;

        let mut confirmed: Vec<ScoredCandidate> = selection
            .picks
            .into_iter()
            .zip(verdicts)
            .filter_map(|(pick, live)| {
                if !live {
                    tracing::info!(id = %pick.id(), url = %pick.candidate.external_url, "Selected candidate is not live");
                }
                live.then_some(pick)
            })
            .collect();

        let mut replacements = 0usize;
        while confirmed.len() < TRIPLE_SIZE && replacements < self.max_replacements {
            let Some(candidate) = selector.next_pick(&confirmed, ranked, &tried) else {
                break;
            };

            tried.insert(candidate.id().to_string());
            replacements += 1;

            if self.check(&candidate.candidate.external_url).await {
                tracing::debug!(id = %candidate.id(), "Replacement confirmed");
                confirmed.push(candidate);
            }
        }

        if confirmed.is_empty() {
            tracing::warn!(
                checked = tried.len(),
                replacements = replacements,
                "No live candidates could be confirmed"
            );
            return Err(AppError::NoLiveCandidates);
        }

        confirmed.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        let partial = confirmed.len() < TRIPLE_SIZE;

        tracing::info!(
            confirmed = confirmed.len(),
            replacements = replacements,
            partial = partial,
            processing_time_ms = start.elapsed().as_millis(),
            "Availability verification completed"
        );

        Ok(RecommendationTriple {
            candidates: confirmed,
            partial,
        })
    }

    /// Timeouts and errors count as not live; only those are retried
    async fn check(&self, url: &str) -> bool {
        for attempt in 0..=self.retries {
            match tokio::time::timeout(self.timeout, self.checker.is_live(url)).await {
                Ok(Ok(live)) => return live,
                Ok(Err(e)) => {
                    tracing::debug!(url = %url, attempt = attempt, error = %e, "Liveness check failed");
                }
                Err(_) => {
                    tracing::debug!(url = %url, attempt = attempt, "Liveness check timed out");
                }
            }
        }
        false
    }
}
