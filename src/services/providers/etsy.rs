/// Etsy Open API v3 provider (gifts)
///
/// `/v3/application/listings/active` supports keyword and price filtering
/// server side. Prices arrive as `{amount, divisor, currency_code}`.
use crate::{
    error::AppResult,
    models::{CandidateRecommendation, CandidateSource, RecommendationCategory, SearchParams},
    services::providers::{ensure_success, non_empty, ProviderClient},
};
use reqwest::Client as HttpClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    results: Vec<EtsyListing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtsyListing {
    pub listing_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: EtsyMoney,
    pub url: String,
    pub shop_id: u64,
    #[serde(default)]
    pub shop: Option<EtsyShop>,
    #[serde(default)]
    pub images: Vec<EtsyImage>,
    #[serde(default)]
    pub taxonomy_path: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtsyMoney {
    pub amount: i64,
    pub divisor: i64,
    pub currency_code: String,
}

impl EtsyMoney {
    fn to_minor_units(&self) -> Option<i64> {
        if self.divisor <= 0 || self.amount < 0 {
            return None;
        }
        Some(self.amount * 100 / self.divisor)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtsyShop {
    pub shop_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtsyImage {
    #[serde(rename = "url_570xN")]
    pub url: String,
}

#[derive(Clone)]
pub struct EtsyProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl EtsyProvider {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
        }
    }

    fn normalize(&self, listing: EtsyListing) -> CandidateRecommendation {
        // Listings from one shop share a merchant even when the shop name is absent
        let merchant = listing
            .shop
            .map(|s| s.shop_name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Etsy shop {}", listing.shop_id));

        CandidateRecommendation {
            id: format!("etsy:{}", listing.listing_id),
            source: CandidateSource::Etsy,
            category: RecommendationCategory::Gift,
            title: listing.title,
            description: non_empty(listing.description),
            price_minor_units: listing.price.to_minor_units(),
            currency: listing.price.currency_code,
            external_url: listing.url,
            image_url: listing.images.into_iter().next().map(|i| i.url),
            merchant_name: Some(merchant),
            location: None,
            provider_category: listing.taxonomy_path.into_iter().last(),
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for EtsyProvider {
    async fn search(&self, params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>> {
        let url = format!("{}/v3/application/listings/active", self.api_url);

        let mut keywords = params.query();
        if let Some(hint) = params.keywords.first() {
            keywords.push(' ');
            keywords.push_str(hint);
        }

        let response = self
            .http_client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[
                ("keywords", keywords),
                ("limit", params.limit.to_string()),
                ("min_price", format!("{:.2}", params.budget.min_amount as f64 / 100.0)),
                ("max_price", format!("{:.2}", params.budget.max_amount as f64 / 100.0)),
                ("sort_on", "score".to_string()),
            ])
            .send()
            .await?;

        let response = ensure_success(response, self.name()).await?;
        let payload: ListingsResponse = response.json().await?;

        let candidates: Vec<CandidateRecommendation> = payload
            .results
            .into_iter()
            .map(|listing| self.normalize(listing))
            .collect();

        tracing::info!(
            provider = self.name(),
            results = candidates.len(),
            "Provider search completed"
        );

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "etsy"
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Etsy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_provider() -> EtsyProvider {
        EtsyProvider::new(
            reqwest::Client::new(),
            "test_key".to_string(),
            "http://test.local".to_string(),
        )
    }

    #[test]
    fn test_listing_deserialization_and_normalize() {
        let json = r#"{
            "count": 1,
            "results": [{
                "listing_id": 1234,
                "title": "Custom Star Map Print",
                "description": "The night sky on your anniversary",
                "price": {"amount": 4250, "divisor": 100, "currency_code": "USD"},
                "url": "https://www.etsy.com/listing/1234/custom-star-map",
                "shop_id": 88,
                "shop": {"shop_name": "NightSkyPrints"},
                "images": [{"url_570xN": "https://i.etsystatic.com/1.jpg"}],
                "taxonomy_path": ["Art & Collectibles", "Prints"]
            }]
        }"#;

        let payload: ListingsResponse = serde_json::from_str(json).unwrap();
        let provider = create_test_provider();
        let candidate = provider.normalize(payload.results.into_iter().next().unwrap());

        assert_eq!(candidate.id, "etsy:1234");
        assert_eq!(candidate.price_minor_units, Some(4250));
        assert_eq!(candidate.merchant_name.as_deref(), Some("NightSkyPrints"));
        assert_eq!(candidate.provider_category.as_deref(), Some("Prints"));
        assert_eq!(candidate.image_url.as_deref(), Some("https://i.etsystatic.com/1.jpg"));
    }

    #[test]
    fn test_missing_shop_name_uses_shop_id() {
        let listing: EtsyListing = serde_json::from_str(
            r#"{
                "listing_id": 1,
                "title": "Mug",
                "price": {"amount": 1800, "divisor": 100, "currency_code": "USD"},
                "url": "https://www.etsy.com/listing/1",
                "shop_id": 42
            }"#,
        )
        .unwrap();

        let candidate = create_test_provider().normalize(listing);
        assert_eq!(candidate.merchant_name.as_deref(), Some("Etsy shop 42"));
        assert_eq!(candidate.provider_category, None);
    }

    #[test]
    fn test_money_with_non_cent_divisor() {
        let money = EtsyMoney {
            amount: 25,
            divisor: 1,
            currency_code: "USD".to_string(),
        };
        assert_eq!(money.to_minor_units(), Some(2500));

        let broken = EtsyMoney {
            amount: 25,
            divisor: 0,
            currency_code: "USD".to_string(),
        };
        assert_eq!(broken.to_minor_units(), None);
    }
}
