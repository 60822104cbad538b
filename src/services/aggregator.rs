use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    config::PipelineSettings,
    error::{AppError, AppResult},
    models::{CandidateRecommendation, SearchParams},
    services::providers::ProviderClient,
};

/// Fans a search out to every configured provider and merges the results
/// into one deduplicated candidate pool.
pub struct SourceAggregator {
    providers: Vec<Arc<dyn ProviderClient>>,
    timeout: Duration,
    pool_target_min: usize,
    pool_target_max: usize,
}

impl SourceAggregator {
    pub fn new(mut providers: Vec<Arc<dyn ProviderClient>>, settings: &PipelineSettings) -> Self {
        // Dedup keeps the first occurrence, so providers are held in priority order
        providers.sort_by_key(|p| p.source().priority());

        Self {
            providers,
            timeout: settings.provider_timeout,
            pool_target_min: settings.pool_target_min,
            pool_target_max: settings.pool_target_max,
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Per-provider result cap so the merged pool lands near the target size
    fn per_provider_limit(&self) -> usize {
        if self.providers.is_empty() {
            return self.pool_target_max;
        }
        self.pool_target_max
            .div_ceil(self.providers.len())
            .max(5)
    }

    /// Queries all providers concurrently
    ///
    /// A provider that errors or exceeds the timeout contributes nothing and is
    /// logged. Only when no provider yields a single candidate does the call fail.
    pub async fn aggregate(&self, params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>> {
        let start = Instant::now();

        if self.providers.is_empty() {
            return Err(AppError::Aggregation(
                "No inventory providers are configured".to_string(),
            ));
        }

        let mut params = params.clone();
        params.limit = self.per_provider_limit();
        let params = Arc::new(params);

        tracing::info!(
            providers = self.providers.len(),
            per_provider_limit = params.limit,
            occasion = %params.occasion,
            "Starting candidate aggregation"
        );

        let mut tasks = Vec::with_capacity(self.providers.len());

        // One task per provider; hitting the timeout drops (cancels) the search future
        for provider in &self.providers {
            let name = provider.name();
            let provider = Arc::clone(provider);
            let params = Arc::clone(&params);
            let timeout = self.timeout;

            let task = tokio::spawn(async move {
                match tokio::time::timeout(timeout, provider.search(&params)).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::ProviderTimeout {
                        provider: provider.name(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            });
            tasks.push((name, task));
        }

        let mut per_provider: Vec<Vec<CandidateRecommendation>> = Vec::new();
        let mut failures = 0usize;

        for (name, task) in tasks {
            match task.await {
                Ok(Ok(candidates)) => {
                    let candidates: Vec<CandidateRecommendation> = candidates
                        .into_iter()
                        .filter(|c| within_budget(c, &params))
                        .collect();
                    tracing::debug!(provider = name, results = candidates.len(), "Provider returned");
                    per_provider.push(candidates);
                }
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!(provider = name, error = %e, "Provider search failed, skipping");
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(provider = name, error = %e, "Provider task join error");
                }
            }
        }

        let pool = self.merge(per_provider);

        if pool.is_empty() {
            tracing::error!(
                providers = self.providers.len(),
                failures = failures,
                "Every provider failed or returned no candidates"
            );
            return Err(AppError::Aggregation(format!(
                "{} of {} providers failed and the rest returned no candidates",
                failures,
                self.providers.len()
            )));
        }

        if failures > 0 {
            tracing::warn!(
                success_count = self.providers.len() - failures,
                error_count = failures,
                "Partial provider failure"
            );
        }

        if pool.len() < self.pool_target_min {
            tracing::warn!(
                pool_size = pool.len(),
                target = self.pool_target_min,
                "Candidate pool is below target size"
            );
        }

        tracing::info!(
            pool_size = pool.len(),
            processing_time_ms = start.elapsed().as_millis(),
            "Aggregation completed"
        );

        Ok(pool)
    }

    /// Deduplicates across providers (earlier provider wins) and interleaves
    /// round-robin so one provider cannot crowd out the others before the cap.
    fn merge(&self, per_provider: Vec<Vec<CandidateRecommendation>>) -> Vec<CandidateRecommendation> {
        let mut seen_keys = HashSet::new();
        let mut seen_ids = HashSet::new();

        let deduped: Vec<Vec<CandidateRecommendation>> = per_provider
            .into_iter()
            .map(|candidates| {
                candidates
                    .into_iter()
                    .filter(|c| seen_ids.insert(c.id.clone()) && seen_keys.insert(c.dedup_key()))
                    .collect()
            })
            .collect();

        interleave(deduped, self.pool_target_max)
    }
}

/// Priced candidates must fall inside the occasion budget
fn within_budget(candidate: &CandidateRecommendation, params: &SearchParams) -> bool {
    candidate
        .price_minor_units
        .map(|price| params.budget.contains(price))
        .unwrap_or(true)
}

/// Round-robin merge that preserves each list's internal order
fn interleave(lists: Vec<Vec<CandidateRecommendation>>, cap: usize) -> Vec<CandidateRecommendation> {
    let mut iterators: Vec<_> = lists.into_iter().map(|l| l.into_iter()).collect();
    let mut merged = Vec::new();

    loop {
        let mut progressed = false;
        for iter in iterators.iter_mut() {
            if merged.len() >= cap {
                return merged;
            }
            if let Some(candidate) = iter.next() {
                merged.push(candidate);
                progressed = true;
            }
        }
        if !progressed {
            return merged;
        }
    }
}
