/// Embedding-similarity classifier
///
/// Content and label texts are embedded through an OpenAI-compatible
/// `/v1/embeddings` endpoint and compared by cosine similarity. Label embeddings
/// (interests, vibe prototypes, trait prototypes) are memoized for the life of
/// the classifier so a batch costs one request for the content texts.
use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::VibeTag,
    services::classifier::{vibe_description, Alignment, ContentClassifier, ContentTraits},
};

/// Similarity at or below which a like contributes nothing
const LIKE_FLOOR: f32 = 0.2;
/// Similarity at or above which a like counts as a full match
const LIKE_CEILING: f32 = 0.6;
/// Minimum dislike similarity for a veto
const VETO_THRESHOLD: f32 = 0.5;
const VIBE_THRESHOLD: f32 = 0.35;
const TRAIT_THRESHOLD: f32 = 0.4;

const PRACTICAL_PROTOTYPE: &str = "practical everyday tool or useful household item";
const SENTIMENTAL_PROTOTYPE: &str = "personalized custom engraved keepsake with sentimental meaning";
const COUPLES_PROTOTYPE: &str = "experience for couples to share together, for two";

/// Text embedding backend
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in order
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings client
#[derive(Clone)]
pub struct HttpEmbedder {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(http_client: HttpClient, api_url: String, api_key: String, model: String) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http_client
            .post(format!("{}/v1/embeddings", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Embedding request failed");
            return Err(AppError::Classification(format!(
                "embedding endpoint returned status {}",
                status
            )));
        }

        let mut payload: EmbeddingResponse = response.json().await?;
        if payload.data.len() != texts.len() {
            return Err(AppError::Classification(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                payload.data.len()
            )));
        }

        payload.data.sort_by_key(|d| d.index);
        Ok(payload.data.into_iter().map(|d| d.embedding).collect())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub struct EmbeddingClassifier {
    embedder: Arc<dyn Embedder>,
    label_cache: RwLock<HashMap<String, Vec<f32>>>,
}

impl EmbeddingClassifier {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            label_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Embeddings for label texts, fetching only the ones not seen before
    async fn label_vectors(&self, labels: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let missing: Vec<String> = {
            let cache = self.label_cache.read().await;
            let mut missing: Vec<String> = labels
                .iter()
                .filter(|l| !cache.contains_key(*l))
                .cloned()
                .collect();
            missing.dedup();
            missing
        };

        if !missing.is_empty() {
            let vectors = self.embedder.embed(&missing).await?;
            let mut cache = self.label_cache.write().await;
            for (label, vector) in missing.into_iter().zip(vectors) {
                cache.insert(label, vector);
            }
        }

        let cache = self.label_cache.read().await;
        labels
            .iter()
            .map(|l| {
                cache
                    .get(l)
                    .cloned()
                    .ok_or_else(|| AppError::Classification(format!("no embedding for label '{}'", l)))
            })
            .collect()
    }

    async fn content_vectors(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(AppError::Classification(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

fn best_similarity(content: &[f32], labels: &[Vec<f32>]) -> f32 {
    labels
        .iter()
        .map(|label| cosine_similarity(content, label))
        .fold(0.0, f32::max)
}

fn alignment_from_similarity(content: &[f32], likes: &[Vec<f32>], dislikes: &[Vec<f32>]) -> Alignment {
    let like = best_similarity(content, likes);
    let dislike = best_similarity(content, dislikes);

    // Hard exclusion, regardless of how well the likes match
    if dislike >= VETO_THRESHOLD {
        return Alignment::veto();
    }

    let scaled = (like - LIKE_FLOOR) / (LIKE_CEILING - LIKE_FLOOR);
    Alignment::scored(scaled as f64)
}

fn vibe_labels() -> Vec<String> {
    VibeTag::ALL
        .iter()
        .map(|v| vibe_description(*v).to_string())
        .collect()
}

fn trait_labels() -> Vec<String> {
    vec![
        PRACTICAL_PROTOTYPE.to_string(),
        SENTIMENTAL_PROTOTYPE.to_string(),
        COUPLES_PROTOTYPE.to_string(),
    ]
}

#[async_trait::async_trait]
impl ContentClassifier for EmbeddingClassifier {
    async fn score_alignment(
        &self,
        text: &str,
        likes: &[String],
        dislikes: &[String],
    ) -> AppResult<Alignment> {
        let mut results = self
            .score_alignment_batch(&[text.to_string()], likes, dislikes)
            .await?;
        Ok(results.pop().unwrap_or_default())
    }

    async fn classify_vibe(&self, text: &str) -> AppResult<Option<VibeTag>> {
        let mut results = self.classify_vibe_batch(&[text.to_string()]).await?;
        Ok(results.pop().flatten())
    }

    async fn classify_traits(&self, text: &str) -> AppResult<ContentTraits> {
        let mut results = self.classify_traits_batch(&[text.to_string()]).await?;
        Ok(results.pop().unwrap_or_default())
    }

    async fn score_alignment_batch(
        &self,
        texts: &[String],
        likes: &[String],
        dislikes: &[String],
    ) -> AppResult<Vec<Alignment>> {
        let like_vectors = self.label_vectors(likes).await?;
        let dislike_vectors = self.label_vectors(dislikes).await?;
        let content = self.content_vectors(texts).await?;

        Ok(content
            .iter()
            .map(|c| alignment_from_similarity(c, &like_vectors, &dislike_vectors))
            .collect())
    }

    async fn classify_vibe_batch(&self, texts: &[String]) -> AppResult<Vec<Option<VibeTag>>> {
        let prototypes = self.label_vectors(&vibe_labels()).await?;
        let content = self.content_vectors(texts).await?;

        Ok(content
            .iter()
            .map(|c| {
                VibeTag::ALL
                    .iter()
                    .zip(&prototypes)
                    .map(|(vibe, prototype)| (*vibe, cosine_similarity(c, prototype)))
                    .filter(|(_, similarity)| *similarity >= VIBE_THRESHOLD)
                    .fold(None, |best: Option<(VibeTag, f32)>, (vibe, similarity)| match best {
                        Some((_, top)) if top >= similarity => best,
                        _ => Some((vibe, similarity)),
                    })
                    .map(|(vibe, _)| vibe)
            })
            .collect())
    }

    async fn classify_traits_batch(&self, texts: &[String]) -> AppResult<Vec<ContentTraits>> {
        let prototypes = self.label_vectors(&trait_labels()).await?;
        let content = self.content_vectors(texts).await?;

        Ok(content
            .iter()
            .map(|c| ContentTraits {
                practical: cosine_similarity(c, &prototypes[0]) >= TRAIT_THRESHOLD,
                sentimental: cosine_similarity(c, &prototypes[1]) >= TRAIT_THRESHOLD,
                couples: cosine_similarity(c, &prototypes[2]) >= TRAIT_THRESHOLD,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "embedding"
    }
}
