use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    models::{LoveLanguage, PreferenceProfile, RecommendationCategory, ScoredCandidate, VibeTag},
    services::classifier::{ContentClassifier, ContentTraits},
};

/// Boost applied when a candidate's classified vibe is one the partner selected
pub const VIBE_BOOST: f64 = 0.30;

/// Vibe tags already known for candidate ids, keyed by id
pub type VibeCache = HashMap<String, Option<VibeTag>>;

/// Whether a love language applies to a candidate
fn affects(language: LoveLanguage, category: RecommendationCategory, traits: ContentTraits) -> bool {
    use RecommendationCategory::*;

    match language {
        LoveLanguage::ReceivingGifts => category == Gift,
        LoveLanguage::QualityTime => matches!(category, Experience | Date),
        LoveLanguage::ActsOfService => category == Gift && traits.practical,
        LoveLanguage::WordsOfAffirmation => category == Gift && traits.sentimental,
        LoveLanguage::PhysicalTouch => matches!(category, Experience | Date) && traits.couples,
    }
}

/// (primary, secondary) boost magnitudes
fn magnitudes(language: LoveLanguage) -> (f64, f64) {
    match language {
        LoveLanguage::ReceivingGifts | LoveLanguage::QualityTime => (0.40, 0.20),
        LoveLanguage::ActsOfService
        | LoveLanguage::WordsOfAffirmation
        | LoveLanguage::PhysicalTouch => (0.20, 0.10),
    }
}

/// Margin keeping a primary match above any secondary-only match of equal magnitude
pub const PRIMARY_PRECEDENCE: f64 = 0.05;

/// Love-language boost for one candidate; primary and secondary never stack
///
/// A candidate the primary applies to always scores strictly above one only the
/// secondary applies to, even where the two magnitudes are equal.
pub fn love_language_boost(
    primary: LoveLanguage,
    secondary: LoveLanguage,
    category: RecommendationCategory,
    traits: ContentTraits,
) -> f64 {
    let secondary_ceiling = magnitudes(secondary).1;

    if affects(primary, category, traits) {
        magnitudes(primary).0.max(secondary_ceiling + PRIMARY_PRECEDENCE)
    } else if affects(secondary, category, traits) {
        secondary_ceiling
    } else {
        0.0
    }
}

pub fn vibe_boost(tag: Option<VibeTag>, selected: &[VibeTag]) -> f64 {
    match tag {
        Some(tag) if selected.contains(&tag) => VIBE_BOOST,
        _ => 0.0,
    }
}

pub fn final_score(interest: f64, vibe: f64, love_language: f64) -> f64 {
    interest * (1.0 + vibe) * (1.0 + love_language)
}

/// Applies vibe and love-language boosts and re-sorts by final score
pub struct VibeScorer {
    classifier: Arc<dyn ContentClassifier>,
}

impl VibeScorer {
    pub fn new(classifier: Arc<dyn ContentClassifier>) -> Self {
        Self { classifier }
    }

    /// Scores filtered candidates against `vibes` (the profile's set or an override)
    ///
    /// Classification failures only cost the boost: the candidate keeps its
    /// interest score and the failure is logged.
    pub async fn score(
        &self,
        profile: &PreferenceProfile,
        vibes: &[VibeTag],
        candidates: Vec<ScoredCandidate>,
        known_vibes: &VibeCache,
    ) -> Vec<ScoredCandidate> {
        if candidates.is_empty() {
            return candidates;
        }

        let tags = self.vibe_tags(&candidates, known_vibes).await;
        let traits = self.traits(&candidates).await;

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .zip(tags)
            .zip(traits)
            .map(|((mut candidate, tag), traits)| {
                candidate.vibe_tag = tag;
                candidate.vibe_score = vibe_boost(tag, vibes);
                candidate.love_language_score = love_language_boost(
                    profile.primary_love_language,
                    profile.secondary_love_language,
                    candidate.candidate.category,
                    traits,
                );
                candidate.final_score = final_score(
                    candidate.interest_score,
                    candidate.vibe_score,
                    candidate.love_language_score,
                );
                candidate
            })
            .collect();

        // Stable, so ties keep the filter's order
        scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

        tracing::info!(
            candidates = scored.len(),
            vibe_matches = scored.iter().filter(|c| c.vibe_score > 0.0).count(),
            top_score = scored.first().map(|c| c.final_score).unwrap_or_default(),
            "Scoring completed"
        );

        scored
    }

    async fn vibe_tags(&self, candidates: &[ScoredCandidate], known: &VibeCache) -> Vec<Option<VibeTag>> {
        let unknown: Vec<usize> = (0..candidates.len())
            .filter(|i| !known.contains_key(candidates[*i].id()))
            .collect();

        let mut tags: Vec<Option<VibeTag>> = candidates
            .iter()
            .map(|c| known.get(c.id()).copied().flatten())
            .collect();

        if unknown.is_empty() {
            return tags;
        }

        let texts: Vec<String> = unknown
            .iter()
            .map(|i| candidates[*i].candidate.content_text())
            .collect();

        match self.classifier.classify_vibe_batch(&texts).await {
            Ok(classified) if classified.len() == unknown.len() => {
                for (i, tag) in unknown.into_iter().zip(classified) {
                    tags[i] = tag;
                }
            }
            Ok(classified) => {
                tracing::warn!(
                    expected = unknown.len(),
                    received = classified.len(),
                    "Vibe classification returned the wrong number of results"
                );
            }
            Err(e) => {
                tracing::warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "Vibe classification failed, scoring without vibe boosts"
                );
            }
        }

        tags
    }

    async fn traits(&self, candidates: &[ScoredCandidate]) -> Vec<ContentTraits> {
        let texts: Vec<String> = candidates
            .iter()
            .map(|c| c.candidate.content_text())
            .collect();

        match self.classifier.classify_traits_batch(&texts).await {
            Ok(traits) if traits.len() == candidates.len() => traits,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    classifier = self.classifier.name(),
                    "Trait classification unavailable, applying category boosts only"
                );
                vec![ContentTraits::default(); candidates.len()]
            }
        }
    }
}
