/// Keyword lexicon classifier
///
/// Needs no network and is deterministic, which makes it the default strategy
/// and the one the pipeline tests run against. Matching is done on normalized
/// words: a single-word keyword matches a word (or its plural), a multi-word
/// keyword matches a phrase.
use crate::{
    error::AppResult,
    models::{canonical_interest, normalize_text, VibeTag},
    services::classifier::{Alignment, ContentClassifier, ContentTraits},
};

/// Interest score when the content matches none of the likes
const BASELINE_SCORE: f64 = 0.2;

const INTEREST_KEYWORDS: &[(&str, &[&str])] = &[
    ("Travel", &["travel", "trip", "luggage", "passport", "suitcase", "getaway"]),
    ("Cooking", &["cooking", "cook", "chef", "kitchen", "cookware", "skillet", "recipe", "culinary"]),
    ("Baking", &["baking", "bake", "bakery", "pastry", "bread", "cake"]),
    ("Wine", &["wine", "winery", "vineyard", "sommelier", "decanter", "cabernet", "pinot"]),
    ("Coffee", &["coffee", "espresso", "latte", "roaster", "cafe"]),
    ("Tea", &["tea", "matcha", "teapot", "chai"]),
    ("Fitness", &["fitness", "gym", "workout", "dumbbell", "kettlebell"]),
    ("Yoga", &["yoga", "meditation", "pilates"]),
    ("Running", &["running", "runner", "marathon"]),
    ("Hiking", &["hiking", "hike", "trail", "trek"]),
    ("Camping", &["camping", "tent", "campfire", "campsite", "sleeping bag"]),
    ("Cycling", &["cycling", "bike", "bicycle"]),
    ("Golf", &["golf", "golfer", "putter", "fairway", "tee time"]),
    ("Tennis", &["tennis", "racket", "racquet", "pickleball"]),
    ("Swimming", &["swimming", "swim", "swimsuit"]),
    ("Skiing", &["skiing", "ski", "snowboard"]),
    ("Music", &["music", "vinyl", "guitar", "piano", "jazz", "playlist"]),
    ("Concerts", &["concert", "live music", "festival", "gig"]),
    ("Theater", &["theater", "theatre", "broadway", "musical", "opera", "ballet"]),
    ("Movies", &["movie", "film", "cinema", "screening"]),
    ("Reading", &["book", "reading", "novel", "bookstore", "library"]),
    ("Writing", &["writing", "journal", "notebook", "fountain pen", "stationery"]),
    ("Art", &["art", "painting", "gallery", "museum", "print", "sculpture", "canvas"]),
    ("Photography", &["photography", "camera", "polaroid", "lens"]),
    ("Fashion", &["fashion", "clothing", "jacket", "dress", "boutique", "scarf"]),
    ("Beauty", &["beauty", "skincare", "makeup", "perfume", "cosmetic"]),
    ("Gardening", &["gardening", "garden", "seed", "planter", "trowel"]),
    ("Plants", &["plant", "succulent", "terrarium", "bonsai", "houseplant"]),
    ("Gaming", &["gaming", "video game", "console", "gamer", "esports", "arcade"]),
    ("Technology", &["technology", "tech", "gadget", "headphones", "speaker"]),
    ("Sports", &["sports", "stadium", "jersey", "basketball", "football", "baseball", "soccer", "hockey"]),
    ("Dancing", &["dance", "dancing", "salsa", "ballroom", "tango"]),
    ("Pets", &["pet", "dog", "cat", "puppy"]),
    ("Crafts", &["craft", "knitting", "pottery", "ceramics", "embroidery", "diy"]),
    ("Board Games", &["board game", "puzzle", "chess", "tabletop"]),
    ("History", &["history", "historic", "heritage"]),
    ("Science", &["science", "planetarium", "astronomy", "telescope"]),
    ("Outdoors", &["outdoors", "outdoor", "nature", "kayak", "national park"]),
    ("Spa", &["spa", "massage", "sauna", "facial"]),
    ("Food", &["food", "restaurant", "dining", "tasting", "bistro", "chocolate", "gourmet", "sushi"]),
];

const VIBE_KEYWORDS: &[(VibeTag, &[&str])] = &[
    (VibeTag::QuietLuxury, &["luxury", "cashmere", "silk", "bespoke", "premium", "tailored", "michelin"]),
    (VibeTag::StreetUrban, &["streetwear", "sneaker", "urban", "graffiti", "skate", "hip hop"]),
    (VibeTag::Outdoorsy, &["outdoor", "outdoors", "trail", "nature", "camping", "kayak", "park"]),
    (VibeTag::Vintage, &["vintage", "retro", "antique", "vinyl", "heritage", "thrift"]),
    (VibeTag::Minimalist, &["minimalist", "minimal", "simple", "modern", "scandinavian", "matte"]),
    (VibeTag::Bohemian, &["boho", "bohemian", "macrame", "rattan", "woven", "tapestry", "eclectic"]),
    (VibeTag::Romantic, &["romantic", "candlelit", "rose", "love", "sunset", "starlit", "moonlit"]),
    (VibeTag::Adventurous, &["adventure", "thrill", "zipline", "skydiving", "escape room", "climbing", "rafting"]),
];

const PRACTICAL_KEYWORDS: &[&str] = &[
    "practical", "tool", "organizer", "kit", "cookware", "skillet", "charger", "storage", "everyday",
    "utility", "repair",
];

const SENTIMENTAL_KEYWORDS: &[&str] = &[
    "personalized", "custom", "engraved", "monogram", "keepsake", "memory", "handwritten",
    "anniversary", "star map", "photo book",
];

const COUPLES_KEYWORDS: &[&str] = &[
    "couples", "couple", "for two", "date night", "together", "duet", "partner",
];

/// Words of the normalized text, padded for phrase matching
struct Tokens {
    words: Vec<String>,
    padded: String,
}

impl Tokens {
    fn new(text: &str) -> Self {
        let normalized = normalize_text(text);
        Self {
            words: normalized.split(' ').map(str::to_string).collect(),
            padded: format!(" {} ", normalized),
        }
    }

    fn contains(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            return self.padded.contains(&format!(" {} ", keyword));
        }
        self.words.iter().any(|word| {
            word == keyword
                || word
                    .strip_suffix('s')
                    .is_some_and(|stem| stem == keyword || stem.strip_suffix('e') == Some(keyword))
        })
    }

    fn count(&self, keywords: &[&str]) -> usize {
        keywords.iter().filter(|k| self.contains(k)).count()
    }
}

fn interest_keywords(interest: &str) -> &'static [&'static str] {
    let Some(canonical) = canonical_interest(interest) else {
        return &[];
    };
    INTEREST_KEYWORDS
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    fn alignment(&self, text: &str, likes: &[String], dislikes: &[String]) -> Alignment {
        let tokens = Tokens::new(text);

        if dislikes
            .iter()
            .any(|dislike| tokens.count(interest_keywords(dislike)) > 0)
        {
            return Alignment::veto();
        }

        let matched = likes
            .iter()
            .filter(|like| tokens.count(interest_keywords(like)) > 0)
            .count();

        Alignment::scored(match matched {
            0 => BASELINE_SCORE,
            1 => 0.6,
            2 => 0.8,
            _ => 1.0,
        })
    }

    fn vibe(&self, text: &str) -> Option<VibeTag> {
        let tokens = Tokens::new(text);

        // Ties resolve to the earlier vibe in the table
        let mut best: Option<(VibeTag, usize)> = None;
        for (vibe, keywords) in VIBE_KEYWORDS {
            let hits = tokens.count(keywords);
            if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
                best = Some((*vibe, hits));
            }
        }
        best.map(|(vibe, _)| vibe)
    }

    fn traits(&self, text: &str) -> ContentTraits {
        let tokens = Tokens::new(text);
        ContentTraits {
            practical: tokens.count(PRACTICAL_KEYWORDS) > 0,
            sentimental: tokens.count(SENTIMENTAL_KEYWORDS) > 0,
            couples: tokens.count(COUPLES_KEYWORDS) > 0,
        }
    }
}

#[async_trait::async_trait]
impl ContentClassifier for RuleBasedClassifier {
    async fn score_alignment(
        &self,
        text: &str,
        likes: &[String],
        dislikes: &[String],
    ) -> AppResult<Alignment> {
        Ok(self.alignment(text, likes, dislikes))
    }

    async fn classify_vibe(&self, text: &str) -> AppResult<Option<VibeTag>> {
        Ok(self.vibe(text))
    }

    async fn classify_traits(&self, text: &str) -> AppResult<ContentTraits> {
        Ok(self.traits(text))
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::INTEREST_VOCABULARY;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_every_interest_has_keywords() {
        for interest in INTEREST_VOCABULARY {
            assert!(
                !interest_keywords(interest).is_empty(),
                "no keywords for {}",
                interest
            );
        }
    }

    #[tokio::test]
    async fn test_dislike_vetoes() {
        let classifier = RuleBasedClassifier::new();
        let alignment = classifier
            .score_alignment(
                "Engraved Golf Putter. Premium putter for the fairway",
                &labels(&["Wine", "Art"]),
                &labels(&["Golf"]),
            )
            .await
            .unwrap();
        assert!(alignment.vetoed);
        assert_eq!(alignment.score, 0.0);
    }

    #[tokio::test]
    async fn test_score_grows_with_matched_likes() {
        let classifier = RuleBasedClassifier::new();
        let likes = labels(&["Wine", "Cooking", "Art", "Music", "Hiking"]);
        let dislikes = labels(&["Golf"]);

        let none = classifier
            .score_alignment("Plain white mug", &likes, &dislikes)
            .await
            .unwrap();
        let one = classifier
            .score_alignment("Wine decanter", &likes, &dislikes)
            .await
            .unwrap();
        let two = classifier
            .score_alignment("Wine tasting cooking class with a chef", &likes, &dislikes)
            .await
            .unwrap();
        let three = classifier
            .score_alignment("Jazz and wine night at the gallery with a chef", &likes, &dislikes)
            .await
            .unwrap();

        assert_eq!(none.score, BASELINE_SCORE);
        assert_eq!(one.score, 0.6);
        assert_eq!(two.score, 0.8);
        assert_eq!(three.score, 1.0);
    }

    #[test]
    fn test_plural_and_phrase_matching() {
        let tokens = Tokens::new("Two Candles & a Board Game for Couples");
        assert!(tokens.contains("board game"));
        assert!(tokens.contains("couple"));
        assert!(!tokens.contains("golf"));

        let tokens = Tokens::new("Hand-thrown glasses");
        assert!(tokens.contains("glass"));
    }

    #[tokio::test]
    async fn test_classify_vibe() {
        let classifier = RuleBasedClassifier::new();
        assert_eq!(
            classifier
                .classify_vibe("Candlelit rooftop dinner at sunset")
                .await
                .unwrap(),
            Some(VibeTag::Romantic)
        );
        assert_eq!(
            classifier.classify_vibe("Retro vinyl record player").await.unwrap(),
            Some(VibeTag::Vintage)
        );
        assert_eq!(classifier.classify_vibe("A mug").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_classify_traits() {
        let classifier = RuleBasedClassifier::new();
        let traits = classifier
            .classify_traits("Custom engraved cutting board kit")
            .await
            .unwrap();
        assert!(traits.practical);
        assert!(traits.sentimental);
        assert!(!traits.couples);

        let traits = classifier
            .classify_traits("Couples pottery class for two")
            .await
            .unwrap();
        assert!(traits.couples);
    }

    #[tokio::test]
    async fn test_batch_defaults_preserve_order() {
        let classifier = RuleBasedClassifier::new();
        let texts = labels(&["Retro vinyl", "A mug", "Rose bouquet"]);
        let vibes = classifier.classify_vibe_batch(&texts).await.unwrap();
        assert_eq!(vibes, vec![Some(VibeTag::Vintage), None, Some(VibeTag::Romantic)]);
    }
}
