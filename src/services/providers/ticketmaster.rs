/// Ticketmaster Discovery API provider (experiences)
///
/// `/discovery/v2/events.json` nests results under `_embedded.events`; an
/// empty search omits `_embedded` entirely.
use crate::{
    error::AppResult,
    models::{CandidateRecommendation, CandidateSource, RecommendationCategory, SearchParams},
    services::providers::{ensure_success, non_empty, to_minor_units, ProviderClient},
};
use reqwest::Client as HttpClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct EventSearchResponse {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedEvents>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedEvents {
    #[serde(default)]
    events: Vec<TicketmasterEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketmasterEvent {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub images: Vec<TicketmasterImage>,
    #[serde(default)]
    pub price_ranges: Vec<TicketmasterPriceRange>,
    #[serde(default)]
    pub classifications: Vec<TicketmasterClassification>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<EventVenues>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketmasterImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketmasterPriceRange {
    pub min: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketmasterClassification {
    #[serde(default)]
    pub genre: Option<NamedEntity>,
    #[serde(default)]
    pub segment: Option<NamedEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventVenues {
    #[serde(default)]
    pub venues: Vec<TicketmasterVenue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketmasterVenue {
    pub name: String,
    #[serde(default)]
    pub city: Option<NamedEntity>,
}

#[derive(Clone)]
pub struct TicketmasterProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl TicketmasterProvider {
    pub fn new(http_client: HttpClient, api_key: String, api_url: String) -> Self {
        Self {
            http_client,
            api_key,
            api_url,
        }
    }

    fn normalize(&self, event: TicketmasterEvent, currency: &str) -> CandidateRecommendation {
        let venue = event
            .embedded
            .and_then(|e| e.venues.into_iter().next());

        // Tickets for two at the cheapest listed price
        let cheapest = event
            .price_ranges
            .iter()
            .min_by(|a, b| a.min.total_cmp(&b.min));
        let price_minor_units = cheapest.and_then(|r| to_minor_units(r.min * 2.0));
        let currency = cheapest
            .and_then(|r| r.currency.clone())
            .unwrap_or_else(|| currency.to_string());

        // "Undefined" is Ticketmaster's placeholder for missing genres
        let genre = event
            .classifications
            .iter()
            .flat_map(|c| [c.genre.as_ref(), c.segment.as_ref()])
            .flatten()
            .map(|g| g.name.clone())
            .find(|name| name != "Undefined");

        CandidateRecommendation {
            id: format!("ticketmaster:{}", event.id),
            source: CandidateSource::Ticketmaster,
            category: RecommendationCategory::Experience,
            title: event.name,
            description: non_empty(event.info),
            price_minor_units,
            currency,
            external_url: event.url,
            image_url: event.images.into_iter().next().map(|i| i.url),
            merchant_name: venue.as_ref().map(|v| v.name.clone()),
            location: venue.and_then(|v| v.city).map(|c| c.name),
            provider_category: genre,
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for TicketmasterProvider {
    async fn search(&self, params: &SearchParams) -> AppResult<Vec<CandidateRecommendation>> {
        let url = format!("{}/discovery/v2/events.json", self.api_url);

        let mut query = vec![
            ("apikey", self.api_key.clone()),
            ("keyword", params.query()),
            ("size", params.limit.min(50).to_string()),
            ("sort", "relevance,desc".to_string()),
        ];
        if let Some(city) = &params.location {
            query.push(("city", city.clone()));
        }

        let response = self.http_client.get(&url).query(&query).send().await?;
        let response = ensure_success(response, self.name()).await?;
        let payload: EventSearchResponse = response.json().await?;

        let candidates: Vec<CandidateRecommendation> = payload
            .embedded
            .map(|e| e.events)
            .unwrap_or_default()
            .into_iter()
            .map(|event| self.normalize(event, &params.budget.currency))
            .collect();

        tracing::info!(
            provider = self.name(),
            results = candidates.len(),
            "Provider search completed"
        );

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "ticketmaster"
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Ticketmaster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_provider() -> TicketmasterProvider {
        TicketmasterProvider::new(
            reqwest::Client::new(),
            "test_key".to_string(),
            "http://test.local".to_string(),
        )
    }

    #[test]
    fn test_event_normalization() {
        let json = r#"{
            "_embedded": {
                "events": [{
                    "id": "vv1A",
                    "name": "Jazz Under the Stars",
                    "url": "https://www.ticketmaster.com/event/vv1A",
                    "images": [{"url": "https://s1.ticketm.net/jazz.jpg"}],
                    "priceRanges": [{"min": 45.0, "currency": "USD"}, {"min": 30.5, "currency": "USD"}],
                    "classifications": [{"segment": {"name": "Music"}, "genre": {"name": "Jazz"}}],
                    "_embedded": {"venues": [{"name": "Moody Amphitheater", "city": {"name": "Austin"}}]}
                }]
            }
        }"#;

        let payload: EventSearchResponse = serde_json::from_str(json).unwrap();
        let event = payload.embedded.unwrap().events.into_iter().next().unwrap();
        let candidate = create_test_provider().normalize(event, "USD");

        assert_eq!(candidate.id, "ticketmaster:vv1A");
        assert_eq!(candidate.category, RecommendationCategory::Experience);
        assert_eq!(candidate.price_minor_units, Some(6_100));
        assert_eq!(candidate.merchant_name.as_deref(), Some("Moody Amphitheater"));
        assert_eq!(candidate.location.as_deref(), Some("Austin"));
        assert_eq!(candidate.provider_category.as_deref(), Some("Jazz"));
    }

    #[test]
    fn test_empty_search_has_no_embedded() {
        let payload: EventSearchResponse = serde_json::from_str(r#"{"page": {"size": 0}}"#).unwrap();
        assert!(payload.embedded.is_none());
    }

    #[test]
    fn test_undefined_genre_skipped() {
        let event: TicketmasterEvent = serde_json::from_str(
            r#"{
                "id": "e1",
                "name": "Mystery Show",
                "url": "https://www.ticketmaster.com/event/e1",
                "classifications": [{"genre": {"name": "Undefined"}, "segment": {"name": "Arts & Theatre"}}]
            }"#,
        )
        .unwrap();

        let candidate = create_test_provider().normalize(event, "USD");
        assert_eq!(candidate.provider_category.as_deref(), Some("Arts & Theatre"));
        assert_eq!(candidate.price_minor_units, None);
        assert_eq!(candidate.merchant_name, None);
    }
}
