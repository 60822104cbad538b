/// External inventory provider abstraction
///
/// Every source (Shopify, Etsy, Ticketmaster, Yelp) returns its own raw payload
/// shape. Providers convert those payloads into `CandidateRecommendation` before
/// returning, so nothing provider-specific travels past this boundary.
use crate::{
    error::{AppError, AppResult},
    models::{CandidateRecommendation, CandidateSource, SearchParams},
};

pub mod etsy;
pub mod shopify;
pub mod ticketmaster;
pub mod yelp;

pub use etsy::EtsyProvider;
pub use shopify::ShopifyProvider;
pub use ticketmaster::TicketmasterProvider;
pub use yelp::YelpProvider;

/// Trait for inventory providers queried by the aggregator
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    /// Search the provider and return normalized candidates
    async fn search(&self, params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;

    /// Source tag stamped on every candidate this provider returns
    fn source(&self) -> CandidateSource;
}

/// Converts a major-unit amount (e.g. 24.99) into minor units (2499)
pub fn to_minor_units(amount: f64) -> Option<i64> {
    if amount.is_finite() && amount >= 0.0 {
        Some((amount * 100.0).round() as i64)
    } else {
        None
    }
}

/// Parses a major-unit price string such as "24.00" or "$1,299.50"
pub fn parse_major_units(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok().and_then(to_minor_units)
}

/// Turns a non-success HTTP status into an `ExternalApi` error carrying the body
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    provider: &'static str,
) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(
        provider = provider,
        status = %status,
        body = %body,
        "Provider request failed"
    );
    Err(AppError::ExternalApi(format!(
        "{} returned status {}",
        provider, status
    )))
}

/// Drops empty strings that some providers send instead of null
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
