/// Pluggable content classification
///
/// The filter and scorer only see this trait; which strategy backs it (keyword
/// rules, embedding similarity or a hosted model) is chosen at startup.
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, models::VibeTag};

pub mod embedding;
pub mod hosted;
pub mod rules;

pub use embedding::{EmbeddingClassifier, Embedder, HttpEmbedder};
pub use hosted::HostedModelClassifier;
pub use rules::RuleBasedClassifier;

/// Interest alignment of one piece of content against a like/dislike set
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Alignment {
    /// 0.0 - 1.0
    pub score: f64,
    /// Content matches at least one dislike
    pub vetoed: bool,
}

impl Alignment {
    pub fn veto() -> Self {
        Self {
            score: 0.0,
            vetoed: true,
        }
    }

    pub fn scored(score: f64) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            vetoed: false,
        }
    }
}

/// Content traits the love-language table keys on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentTraits {
    /// Practical or utility item
    pub practical: bool,
    /// Personalized or sentimental item
    pub sentimental: bool,
    /// Meant to be shared by two people
    pub couples: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn score_alignment(
        &self,
        text: &str,
        likes: &[String],
        dislikes: &[String],
    ) -> AppResult<Alignment>;

    /// Zero or one vibe tag for the content
    async fn classify_vibe(&self, text: &str) -> AppResult<Option<VibeTag>>;

    async fn classify_traits(&self, text: &str) -> AppResult<ContentTraits>;

    /// Batched form; one result per text, in order
    async fn score_alignment_batch(
        &self,
        texts: &[String],
        likes: &[String],
        dislikes: &[String],
    ) -> AppResult<Vec<Alignment>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.score_alignment(text, likes, dislikes).await?);
        }
        Ok(results)
    }

    async fn classify_vibe_batch(&self, texts: &[String]) -> AppResult<Vec<Option<VibeTag>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.classify_vibe(text).await?);
        }
        Ok(results)
    }

    async fn classify_traits_batch(&self, texts: &[String]) -> AppResult<Vec<ContentTraits>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.classify_traits(text).await?);
        }
        Ok(results)
    }

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}

/// Human-readable descriptor for each vibe, used as a prompt or embedding prototype
pub fn vibe_description(vibe: VibeTag) -> &'static str {
    match vibe {
        VibeTag::QuietLuxury => "quiet luxury: understated premium craftsmanship, cashmere, silk, fine materials",
        VibeTag::StreetUrban => "street urban: streetwear, sneakers, graffiti, city nightlife, skate culture",
        VibeTag::Outdoorsy => "outdoorsy: nature, trails, parks, camping, fresh air",
        VibeTag::Vintage => "vintage: retro, antique, classic, vinyl records, heritage pieces",
        VibeTag::Minimalist => "minimalist: simple, clean lines, modern, scandinavian, uncluttered",
        VibeTag::Bohemian => "bohemian: boho, macrame, woven textiles, eclectic, free spirited",
        VibeTag::Romantic => "romantic: candlelit, roses, love, sunsets, intimate evenings",
        VibeTag::Adventurous => "adventurous: thrill, adrenaline, climbing, rafting, expeditions",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_scored_is_clamped() {
        assert_eq!(Alignment::scored(1.7).score, 1.0);
        assert_eq!(Alignment::scored(-0.2).score, 0.0);
        assert!(!Alignment::scored(0.5).vetoed);
        assert!(Alignment::veto().vetoed);
    }

    #[test]
    fn test_every_vibe_has_a_description() {
        for vibe in VibeTag::ALL {
            assert!(vibe_description(vibe).starts_with(&vibe.as_str().replace('_', " ")));
        }
    }
}
