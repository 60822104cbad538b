//! In-memory collaborators for driving the pipeline without Postgres, Redis or the network
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tandem_api::{
    config::PipelineSettings,
    error::{AppError, AppResult},
    models::{
        BudgetRange, BudgetTiers, CandidateRecommendation, CandidateSource, FeedbackRecord, Hint,
        LoveLanguage, PreferenceProfile, RecommendationCategory, SearchParams, VibeTag,
    },
    routes::{create_router, AppState},
    services::{
        classifier::RuleBasedClassifier, providers::ProviderClient, FeedbackSink, HintIndex,
        LivenessChecker, MemorySessionStore, ProfileStore, RecommendationPipeline,
        SourceAggregator,
    },
};
use uuid::Uuid;

pub const PROFILE_ID: Uuid = Uuid::from_u128(0x5eed);

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// quality_time primary, receiving_gifts secondary; minor occasions span 5001..=15000
pub fn profile() -> PreferenceProfile {
    PreferenceProfile {
        id: PROFILE_ID,
        display_name: "Jordan".to_string(),
        location: Some("Chicago".to_string()),
        likes: labels(&["Cooking", "Wine", "Music", "Hiking", "Art"]),
        dislikes: labels(&["Golf", "Gaming", "Sports", "Fitness", "Camping"]),
        vibes: vec![VibeTag::Romantic, VibeTag::Minimalist],
        budget_tiers: BudgetTiers {
            just_because: BudgetRange::new(0, 5_000, "USD"),
            minor_occasion: BudgetRange::new(5_001, 15_000, "USD"),
            major_milestone: BudgetRange::new(15_001, 50_000, "USD"),
        },
        primary_love_language: LoveLanguage::QualityTime,
        secondary_love_language: LoveLanguage::ReceivingGifts,
    }
}

pub fn minor_budget() -> BudgetRange {
    profile().budget_tiers.minor_occasion
}

pub fn item(
    id: &str,
    category: RecommendationCategory,
    price: i64,
    merchant: &str,
    title: &str,
) -> CandidateRecommendation {
    CandidateRecommendation {
        id: id.to_string(),
        source: CandidateSource::Etsy,
        category,
        title: title.to_string(),
        description: None,
        price_minor_units: Some(price),
        currency: "USD".to_string(),
        external_url: format!("https://shop.example.com/{}", id),
        image_url: None,
        merchant_name: Some(merchant.to_string()),
        location: None,
        provider_category: None,
    }
}

/// Minor-occasion inventory with two dislike traps ("golf-set", "arcade")
pub fn catalog() -> Vec<CandidateRecommendation> {
    use RecommendationCategory::*;
    vec![
        item("golf-set", Gift, 14_000, "Pro Shop", "Golf gift set with wine glasses, art print and cooking apron"),
        item("decanter", Gift, 6_000, "Cellar", "Wine decanter"),
        item("print", Gift, 7_000, "Gallery", "Art print"),
        item("skillet", Gift, 9_000, "Forge", "Cast iron skillet for cooking"),
        item("class", Experience, 10_000, "Chef School", "Cooking class for couples"),
        item("concert", Experience, 13_000, "Arena", "Jazz concert night"),
        item("dinner", Date, 14_000, "Blue Note", "Candlelit jazz dinner"),
        item("tasting", Date, 12_000, "Vineyard", "Vineyard wine tasting"),
        item("hike", Experience, 8_000, "Trail Co", "Guided sunset hike"),
        item("arcade", Date, 7_000, "Arcade Bar", "Arcade gaming night"),
    ]
}

pub struct FakeProfiles {
    profiles: HashMap<Uuid, PreferenceProfile>,
}

impl FakeProfiles {
    pub fn with(profile: PreferenceProfile) -> Self {
        Self {
            profiles: HashMap::from([(profile.id, profile)]),
        }
    }
}

#[async_trait::async_trait]
impl ProfileStore for FakeProfiles {
    async fn get(&self, profile_ref: Uuid) -> AppResult<PreferenceProfile> {
        self.profiles
            .get(&profile_ref)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", profile_ref)))
    }
}

pub struct NoHints;

#[async_trait::async_trait]
impl HintIndex for NoHints {
    async fn query_similar(
        &self,
        _text: &str,
        _profile_ref: Uuid,
        _k: usize,
        _threshold: f32,
    ) -> AppResult<Vec<Hint>> {
        Ok(vec![])
    }
}

/// Returns the same items on every search and counts calls
pub struct StaticProvider {
    pub items: Vec<CandidateRecommendation>,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(items: Vec<CandidateRecommendation>) -> Arc<Self> {
        Arc::new(Self {
            items,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProviderClient for StaticProvider {
    async fn search(&self, _params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Etsy
    }
}

pub struct FailingProvider {
    pub source: CandidateSource,
}

#[async_trait::async_trait]
impl ProviderClient for FailingProvider {
    async fn search(&self, _params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>> {
        Err(AppError::ExternalApi("503 Service Unavailable".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }

    fn source(&self) -> CandidateSource {
        self.source
    }
}

/// Every URL is live except those ending in one of the dead ids
#[derive(Default)]
pub struct DeadLinks {
    dead: HashSet<String>,
}

impl DeadLinks {
    pub fn with(ids: &[&str]) -> Self {
        Self {
            dead: ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait::async_trait]
impl LivenessChecker for DeadLinks {
    async fn is_live(&self, url: &str) -> AppResult<bool> {
        Ok(!self.dead.iter().any(|id| url.ends_with(&format!("/{}", id))))
    }
}

#[derive(Default)]
pub struct RecordingFeedback {
    pub records: Mutex<Vec<FeedbackRecord>>,
}

#[async_trait::async_trait]
impl FeedbackSink for RecordingFeedback {
    async fn record(&self, feedback: &FeedbackRecord) -> AppResult<()> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal("feedback lock poisoned".to_string()))?
            .push(feedback.clone());
        Ok(())
    }
}

pub fn pipeline_with(
    providers: Vec<Arc<dyn ProviderClient>>,
    checker: DeadLinks,
) -> Arc<RecommendationPipeline> {
    let settings = PipelineSettings {
        provider_timeout: Duration::from_millis(500),
        liveness_timeout: Duration::from_millis(200),
        ..PipelineSettings::default()
    };

    Arc::new(RecommendationPipeline::new(
        Arc::new(FakeProfiles::with(profile())),
        Arc::new(NoHints),
        SourceAggregator::new(providers, &settings),
        Arc::new(RuleBasedClassifier::new()),
        Arc::new(checker),
        Arc::new(MemorySessionStore::new(Duration::from_secs(300))),
        settings,
    ))
}

/// Single static provider over `catalog()`, all links live
pub fn pipeline() -> Arc<RecommendationPipeline> {
    let providers: Vec<Arc<dyn ProviderClient>> = vec![StaticProvider::new(catalog()) as Arc<dyn ProviderClient>];
    pipeline_with(providers, DeadLinks::default())
}

pub fn router(pipeline: Arc<RecommendationPipeline>, feedback: Arc<RecordingFeedback>) -> axum::Router {
    create_router(Arc::new(AppState::new(pipeline, feedback)))
}
