/// Yelp Fusion provider (dates)
///
/// Businesses only carry a price *level* ("$".."$$$$"), so the candidate price
/// is an estimate for two people at that level.
use crate::{
    error::{AppError, AppResult},
    models::{CandidateRecommendation, CandidateSource, RecommendationCategory, SearchParams},
    services::providers::{ensure_success, non_empty, ProviderClient},
};
use reqwest::Client as HttpClient;
use serde::Deserialize;

/// Estimated spend for two, in minor units, per Yelp price level
const PRICE_LEVEL_ESTIMATES: [i64; 4] = [3_000, 7_000, 15_000, 30_000];

#[derive(Debug, Deserialize)]
struct BusinessSearchResponse {
    #[serde(default)]
    businesses: Vec<YelpBusiness>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YelpBusiness {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub categories: Vec<YelpCategory>,
    #[serde(default)]
    pub location: Option<YelpLocation>,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YelpCategory {
    pub alias: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YelpLocation {
    #[serde(default)]
    pub display_address: Vec<String>,
}

/// Maps "$".."$$$$" to an estimated spend for two
pub fn estimate_price_level(level: &str) -> Option<i64> {
    let dollars = level.chars().filter(|c| *c == '$').count();
    if dollars == 0 || dollars != level.trim().len() {
        return None;
    }
    PRICE_LEVEL_ESTIMATES.get(dollars - 1).copied()
}

/// Yelp price filter ("1,2,3") covering levels whose estimate fits the budget
fn price_levels_for_budget(max_amount: i64) -> String {
    let levels: Vec<String> = PRICE_LEVEL_ESTIMATES
        .iter()
        .enumerate()
        .filter(|(_, estimate)| **estimate <= max_amount)
        .map(|(i, _)| (i + 1).to_string())
        .collect();

    if levels.is_empty() {
        "1".to_string()
    } else {
        levels.join(",")
    }
}

#[derive(Clone)]
pub struct YelpProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl YelpProvider {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
        }
    }

    fn normalize(&self, business: YelpBusiness, currency: &str) -> Option<CandidateRecommendation> {
        if business.is_closed {
            return None;
        }

        let description = if business.categories.is_empty() {
            None
        } else {
            Some(
                business
                    .categories
                    .iter()
                    .map(|c| c.title.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };

        Some(CandidateRecommendation {
            id: format!("yelp:{}", business.id),
            source: CandidateSource::Yelp,
            category: RecommendationCategory::Date,
            title: business.name.clone(),
            description,
            price_minor_units: business.price.as_deref().and_then(estimate_price_level),
            currency: currency.to_string(),
            external_url: business.url,
            image_url: non_empty(business.image_url),
            merchant_name: Some(business.name),
            location: business
                .location
                .map(|l| l.display_address.join(", "))
                .filter(|l| !l.is_empty()),
            provider_category: business.categories.first().map(|c| c.title.clone()),
        })
    }
}

#[async_trait::async_trait]
impl ProviderClient for YelpProvider {
    async fn search(&self, params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>> {
        let location = params.location.as_deref().ok_or_else(|| {
            AppError::ExternalApi("Yelp search requires a profile location".to_string())
        })?;

        let url = format!("{}/v3/businesses/search", self.api_url);
        let term = format!("{} date night", params.query());

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[
                ("term", term),
                ("location", location.to_string()),
                ("price", price_levels_for_budget(params.budget.max_amount)),
                ("limit", params.limit.min(50).to_string()),
                ("sort_by", "best_match".to_string()),
            ])
            .send()
            .await?;

        let response = ensure_success(response, self.name()).await?;
        let payload: BusinessSearchResponse = response.json().await?;

        let candidates: Vec<CandidateRecommendation> = payload
            .businesses
            .into_iter()
            .filter_map(|b| self.normalize(b, &params.budget.currency))
            .collect();

        tracing::info!(
            provider = self.name(),
            results = candidates.len(),
            "Provider search completed"
        );

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "yelp"
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Yelp
    }
}
