use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tandem_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache},
    routes::{create_router, AppState},
    services::{
        classifier::{
            ContentClassifier, EmbeddingClassifier, HostedModelClassifier, HttpEmbedder,
            RuleBasedClassifier,
        },
        providers::{
            EtsyProvider, ProviderClient, ShopifyProvider, TicketmasterProvider, YelpProvider,
        },
        HttpLivenessChecker, PgFeedbackSink, PgHintIndex, PgProfileStore, RecommendationPipeline,
        RedisSessionStore, SourceAggregator,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tandem_api=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.pipeline_settings();

    let db_pool = create_pool(&config.database_url).await?;
    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client);

    let http_client = HttpClient::builder()
        .user_agent(concat!("tandem-api/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()?;

    let providers = build_providers(&config, &http_client);
    tracing::info!(
        providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "Inventory providers configured"
    );

    let classifier = build_classifier(&config, &http_client)?;
    tracing::info!(classifier = classifier.name(), "Content classifier selected");

    let pipeline = Arc::new(RecommendationPipeline::new(
        Arc::new(PgProfileStore::new(db_pool.clone())),
        Arc::new(PgHintIndex::new(db_pool.clone())),
        SourceAggregator::new(providers, &settings),
        classifier,
        Arc::new(HttpLivenessChecker::new(http_client.clone(), Some(cache.clone()))),
        Arc::new(RedisSessionStore::new(cache, config.session_ttl_secs)),
        settings,
    ));

    let state = Arc::new(AppState::new(
        pipeline,
        Arc::new(PgFeedbackSink::new(db_pool)),
    ));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    Ok(())
}

/// Registers every provider whose credentials are configured
fn build_providers(config: &Config, http_client: &HttpClient) -> Vec<Arc<dyn ProviderClient>> {
    let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();

    if let Some(store_url) = &config.shopify_store_url {
        providers.push(Arc::new(ShopifyProvider::new(
            http_client.clone(),
            store_url.clone(),
        )));
    }
    if let Some(api_key) = &config.etsy_api_key {
        providers.push(Arc::new(EtsyProvider::new(
            http_client.clone(),
            api_key.clone(),
            config.etsy_api_url.clone(),
        )));
    }
    if let Some(api_key) = &config.yelp_api_key {
        providers.push(Arc::new(YelpProvider::new(
            http_client.clone(),
            api_key.clone(),
            config.yelp_api_url.clone(),
        )));
    }
    if let Some(api_key) = &config.ticketmaster_api_key {
        providers.push(Arc::new(TicketmasterProvider::new(
            http_client.clone(),
            api_key.clone(),
            config.ticketmaster_api_url.clone(),
        )));
    }

    if providers.is_empty() {
        tracing::warn!("No inventory provider credentials configured, every generate call will fail");
    }

    providers
}

fn build_classifier(
    config: &Config,
    http_client: &HttpClient,
) -> anyhow::Result<Arc<dyn ContentClassifier>> {
    let api_key = || {
        config.model_api_key.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "MODEL_API_KEY is required for classifier mode '{}'",
                config.classifier_mode
            )
        })
    };

    match config.classifier_mode.as_str() {
        "rules" => Ok(Arc::new(RuleBasedClassifier::new())),
        "embedding" => {
            let embedder = HttpEmbedder::new(
                http_client.clone(),
                config.model_api_url.clone(),
                api_key()?,
                config.embedding_model.clone(),
            );
            Ok(Arc::new(EmbeddingClassifier::new(Arc::new(embedder))))
        }
        "hosted" => Ok(Arc::new(HostedModelClassifier::new(
            http_client.clone(),
            config.model_api_url.clone(),
            api_key()?,
            config.hosted_model.clone(),
        ))),
        other => anyhow::bail!("Unknown CLASSIFIER_MODE '{}'", other),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
