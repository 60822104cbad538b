/// Hosted-model classifier
///
/// Sends a whole batch to an OpenAI-compatible chat completions endpoint in one
/// request and asks for a JSON object back, one entry per numbered item.
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::VibeTag,
    services::classifier::{vibe_description, Alignment, ContentClassifier, ContentTraits},
};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AlignmentItem {
    index: usize,
    score: f64,
    vetoed: bool,
}

#[derive(Debug, Deserialize)]
struct VibeItem {
    index: usize,
    #[serde(default)]
    vibe: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TraitsItem {
    index: usize,
    #[serde(default)]
    practical: bool,
    #[serde(default)]
    sentimental: bool,
    #[serde(default)]
    couples: bool,
}

#[derive(Clone)]
pub struct HostedModelClassifier {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    model: String,
}

impl HostedModelClassifier {
    pub fn new(http_client: HttpClient, api_url: String, api_key: String, model: String) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    async fn complete(&self, prompt: String) -> AppResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You classify gift and date ideas. Reply with a single JSON object and nothing else."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Hosted model request failed");
            return Err(AppError::Classification(format!(
                "hosted model returned status {}",
                status
            )));
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Classification("hosted model returned no choices".to_string()))
    }

    async fn classify_items<T>(&self, instructions: String, texts: &[String]) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned + Indexed,
    {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = format!("{}\n\nItems:\n{}", instructions, numbered(texts));
        let content = self.complete(prompt).await?;
        parse_items(&content, texts.len())
    }
}

trait Indexed {
    fn index(&self) -> usize;
}

impl Indexed for AlignmentItem {
    fn index(&self) -> usize {
        self.index
    }
}

impl Indexed for VibeItem {
    fn index(&self) -> usize {
        self.index
    }
}

impl Indexed for TraitsItem {
    fn index(&self) -> usize {
        self.index
    }
}

fn numbered(texts: &[String]) -> String {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}. {}", i, text.replace('\n', " ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pulls the JSON object out of a reply, tolerating markdown code fences
fn extract_json(content: &str) -> &str {
    let body = if content.contains("```json") {
        content
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(content)
    } else if content.contains("```") {
        content.split("```").nth(1).unwrap_or(content)
    } else {
        content
    };
    body.trim()
}

/// Parses `{"items": [...]}` and returns exactly one item per input, in input order
fn parse_items<T>(content: &str, expected: usize) -> AppResult<Vec<T>>
where
    T: DeserializeOwned + Indexed,
{
    let envelope: ItemsEnvelope<T> = serde_json::from_str(extract_json(content)).map_err(|e| {
        tracing::error!(error = %e, response = %content, "Failed to parse hosted model reply");
        AppError::Classification(format!("unparseable model reply: {}", e))
    })?;

    let mut slots: Vec<Option<T>> = (0..expected).map(|_| None).collect();
    for item in envelope.items {
        let index = item.index();
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(item);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| AppError::Classification(format!("model reply is missing item {}", i)))
        })
        .collect()
}

#[async_trait::async_trait]
impl ContentClassifier for HostedModelClassifier {
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
        let instructions = format!(
            "The recipient likes: {}. The recipient dislikes: {}.\n\
             For each item return {{\"index\", \"score\", \"vetoed\"}}: score is 0.0-1.0 for how well \
             the item matches the likes; vetoed is true when the item relates to any dislike.\n\
             Respond as {{\"items\": [...]}}.",
            likes.join(", "),
            dislikes.join(", ")
        );

        let items: Vec<AlignmentItem> = self.classify_items(instructions, texts).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                if item.vetoed {
                    Alignment::veto()
                } else {
                    Alignment::scored(item.score)
                }
            })
            .collect())
    }

    async fn classify_vibe_batch(&self, texts: &[String]) -> AppResult<Vec<Option<VibeTag>>> {
        let vibes = VibeTag::ALL
            .iter()
            .map(|v| format!("- {} ({})", v.as_str(), vibe_description(*v)))
            .collect::<Vec<_>>()
            .join("\n");
        let instructions = format!(
            "Vibes:\n{}\n\
             For each item return {{\"index\", \"vibe\"}} where vibe is the single best matching vibe \
             name from the list, or null when none fits.\n\
             Respond as {{\"items\": [...]}}.",
            vibes
        );

        let items: Vec<VibeItem> = self.classify_items(instructions, texts).await?;
        Ok(items
            .into_iter()
            .map(|item| item.vibe.as_deref().and_then(VibeTag::parse))
            .collect())
    }

    async fn classify_traits_batch(&self, texts: &[String]) -> AppResult<Vec<ContentTraits>> {
        let instructions = "For each item return {\"index\", \"practical\", \"sentimental\", \"couples\"} \
             as booleans: practical for useful everyday or utility items, sentimental for personalized \
             or keepsake items, couples for experiences meant to be shared by two people.\n\
             Respond as {\"items\": [...]}."
            .to_string();

        let items: Vec<TraitsItem> = self.classify_items(instructions, texts).await?;
        Ok(items
            .into_iter()
            .map(|item| ContentTraits {
                practical: item.practical,
                sentimental: item.sentimental,
                couples: item.couples,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "hosted"
    }
}
