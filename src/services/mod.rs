pub mod aggregator;
pub mod availability;
pub mod classifier;
pub mod filter;
pub mod pipeline;
pub mod providers;
pub mod refresh;
pub mod scorer;
pub mod selector;
pub mod session;
pub mod stores;

pub use aggregator::SourceAggregator;
pub use availability::{AvailabilityVerifier, HttpLivenessChecker, LivenessChecker};
pub use classifier::ContentClassifier;
pub use pipeline::RecommendationPipeline;
pub use refresh::RefreshOrchestrator;
pub use session::{MemorySessionStore, RedisSessionStore, SessionStore};
pub use stores::{FeedbackSink, HintIndex, PgFeedbackSink, PgHintIndex, PgProfileStore, ProfileStore};
