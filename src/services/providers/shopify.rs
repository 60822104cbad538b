/// Shopify storefront provider (gifts)
///
/// Uses the storefront predictive search endpoint, which needs no token:
/// `/search/suggest.json?q=...&resources[type]=product` → products with price,
/// vendor and product type. Product URLs come back relative to the store.
use crate::{
    error::AppResult,
    models::{CandidateRecommendation, CandidateSource, RecommendationCategory, SearchParams},
    services::providers::{ensure_success, non_empty, parse_major_units, ProviderClient},
};
use reqwest::Client as HttpClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    resources: SuggestResources,
}

#[derive(Debug, Deserialize)]
struct SuggestResources {
    results: SuggestResults,
}

#[derive(Debug, Deserialize)]
struct SuggestResults {
    #[serde(default)]
    products: Vec<ShopifyProduct>,
}

/// Product entry in a predictive search response
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyProduct {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    pub url: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Clone)]
pub struct ShopifyProvider {
    http_client: HttpClient,
    store_url: String,
}

impl ShopifyProvider {
    pub fn new(http_client: HttpClient, store_url: String) -> Self {
        Self {
            http_client,
            store_url: store_url.trim_end_matches('/').to_string(),
        }
    }

    /// Converts a raw product into a candidate; unavailable products are dropped
    fn normalize(&self, product: ShopifyProduct, currency: &str) -> Option<CandidateRecommendation> {
        if !product.available {
            return None;
        }

        let external_url = if product.url.starts_with("http") {
            product.url
        } else {
            format!("{}/{}", self.store_url, product.url.trim_start_matches('/'))
        };

        Some(CandidateRecommendation {
            id: format!("shopify:{}", product.id),
            source: CandidateSource::Shopify,
            category: RecommendationCategory::Gift,
            title: product.title,
            description: non_empty(product.body),
            price_minor_units: product.price.as_deref().and_then(parse_major_units),
            currency: currency.to_string(),
            external_url,
            image_url: non_empty(product.image),
            merchant_name: non_empty(product.vendor),
            location: None,
            provider_category: non_empty(product.product_type),
        })
    }
}

#[async_trait::async_trait]
impl ProviderClient for ShopifyProvider {
    async fn search(&self, params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>> {
        let url = format!("{}/search/suggest.json", self.store_url);
        let limit = params.limit.min(10).to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", params.query().as_str()),
                ("resources[type]", "product"),
                ("resources[limit]", limit.as_str()),
            ])
            .send()
            .await?;

        let response = ensure_success(response, self.name()).await?;
        let payload: SuggestResponse = response.json().await?;

        let candidates: Vec<CandidateRecommendation> = payload
            .resources
            .results
            .products
            .into_iter()
            .filter_map(|p| self.normalize(p, &params.budget.currency))
            .collect();

        tracing::info!(
            provider = self.name(),
            results = candidates.len(),
            "Provider search completed"
        );

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "shopify"
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Shopify
    }
}
