use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::chat::ChatSession;
use super::sse::SseDecoder;
use crate::config::RelayConfig;
use crate::protocol::content::Content;

#[derive(Clone)]
pub struct GenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Content of the first candidate.
    pub fn content(&self) -> Option<&Content> {
        self.candidates.first().map(|c| &c.content)
    }

    pub fn text(&self) -> String {
        self.content().map(Content::joined_text).unwrap_or_default()
    }
}

impl GenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(&config.api_base_url, config.api_key.clone(), &config.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn start_chat(&self) -> ChatSession {
        ChatSession::new(self.clone())
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }

    fn post(&self, url: String) -> RequestBuilder {
        let request = self.client.post(url);
        match &self.api_key {
            Some(key) => request.header("x-goog-api-key", key),
            None => request,
        }
    }

    /// Single request/response generation.
    pub async fn generate_content(&self, contents: &[Content]) -> Result<GenerateContentResponse> {
        let response = self
            .post(self.endpoint("generateContent"))
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("GenAI API error {}: {}", status, body));
        }

        Ok(response.json().await?)
    }

    /// Streaming generation. Yields partial responses as the server produces them.
    pub async fn generate_content_stream(
        &self,
        contents: &[Content],
    ) -> Result<BoxStream<'static, Result<GenerateContentResponse>>> {
        let response = self
            .post(format!("{}?alt=sse", self.endpoint("streamGenerateContent")))
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("GenAI API error {}: {}", status, body));
        }

        let bytes = response.bytes_stream().boxed();
        let state = (bytes, SseDecoder::default(), VecDeque::<String>::new(), false);

        let partials = stream::unfold(state, |(mut bytes, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(payload) = ready.pop_front() {
                    debug!("SSE payload: {} bytes", payload.len());
                    let item = serde_json::from_str::<GenerateContentResponse>(&payload).map_err(anyhow::Error::from);
                    return Some((item, (bytes, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(e.into()), (bytes, decoder, ready, done)));
                    }
                    None => {
                        done = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        });

        Ok(partials.boxed())
    }
}
