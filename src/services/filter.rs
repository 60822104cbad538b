use std::cmp::Ordering;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{canonical_interest, CandidateRecommendation, PreferenceProfile, ScoredCandidate},
    services::classifier::{Alignment, ContentClassifier},
};

/// Hard-excludes dislike matches and narrows the pool by interest alignment
pub struct PreferenceFilter {
    classifier: Arc<dyn ContentClassifier>,
    pool_size: usize,
}

/// Outcome of the local literal check on a candidate's provider category
enum LiteralMatch {
    Like,
    Dislike,
    None,
}

fn literal_match(candidate: &CandidateRecommendation, profile: &PreferenceProfile) -> LiteralMatch {
    let Some(category) = candidate.provider_category.as_deref().and_then(canonical_interest) else {
        return LiteralMatch::None;
    };

    let matches = |labels: &[String]| {
        labels
            .iter()
            .any(|label| canonical_interest(label) == Some(category))
    };

    if matches(&profile.dislikes) {
        LiteralMatch::Dislike
    } else if matches(&profile.likes) {
        LiteralMatch::Like
    } else {
        LiteralMatch::None
    }
}

/// Interest desc, then lower price (unpriced last), then aggregation order
fn rank(a: &(usize, ScoredCandidate), b: &(usize, ScoredCandidate)) -> Ordering {
    b.1.interest_score
        .total_cmp(&a.1.interest_score)
        .then_with(|| {
            match (a.1.candidate.price_minor_units, b.1.candidate.price_minor_units) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        })
        .then_with(|| a.0.cmp(&b.0))
}

impl PreferenceFilter {
    pub fn new(classifier: Arc<dyn ContentClassifier>, pool_size: usize) -> Self {
        Self {
            classifier,
            pool_size,
        }
    }

    /// Returns at most `pool_size` candidates ranked by interest alignment
    ///
    /// An empty input yields an empty output; `FilterExhaustion` is reserved
    /// for a non-empty pool that the dislike veto emptied.
    pub async fn filter(
        &self,
        profile: &PreferenceProfile,
        pool: &[CandidateRecommendation],
    ) -> AppResult<Vec<ScoredCandidate>> {
        if pool.is_empty() {
            return Ok(Vec::new());
        }

        let mut literal_likes = Vec::new();
        let mut pending = Vec::new();
        let mut literal_vetoes = 0usize;

        for (index, candidate) in pool.iter().enumerate() {
            match literal_match(candidate, profile) {
                LiteralMatch::Dislike => literal_vetoes += 1,
                LiteralMatch::Like => {
                    literal_likes.push(index);
                    pending.push(index);
                }
                LiteralMatch::None => pending.push(index),
            }
        }

        let texts: Vec<String> = pending.iter().map(|i| pool[*i].content_text()).collect();
        let alignments = if texts.is_empty() {
            Vec::new()
        } else {
            self.classifier
                .score_alignment_batch(&texts, &profile.likes, &profile.dislikes)
                .await
                .map_err(|e| {
                    tracing::error!(
                        classifier = self.classifier.name(),
                        error = %e,
                        "Interest alignment failed"
                    );
                    e
                })?
        };

        if alignments.len() != pending.len() {
            return Err(AppError::Classification(format!(
                "expected {} alignments, received {}",
                pending.len(),
                alignments.len()
            )));
        }

        let mut classifier_vetoes = 0usize;
        let mut survivors: Vec<(usize, ScoredCandidate)> = Vec::with_capacity(pending.len());

        for (index, alignment) in pending.into_iter().zip(alignments) {
            let Alignment { score, vetoed } = alignment;
            if vetoed {
                classifier_vetoes += 1;
                continue;
            }

            let score = if literal_likes.contains(&index) { 1.0 } else { score };
            survivors.push((index, ScoredCandidate::from_interest(pool[index].clone(), score)));
        }

        if survivors.is_empty() {
            tracing::warn!(
                pool_size = pool.len(),
                literal_vetoes = literal_vetoes,
                classifier_vetoes = classifier_vetoes,
                "Dislike veto removed the entire pool"
            );
            return Err(AppError::FilterExhaustion);
        }

        survivors.sort_by(rank);
        survivors.truncate(self.pool_size);

        tracing::info!(
            pool_size = pool.len(),
            vetoed = literal_vetoes + classifier_vetoes,
            kept = survivors.len(),
            "Preference filter completed"
        );

        Ok(survivors.into_iter().map(|(_, scored)| scored).collect())
    }
}
