//! Text-generation clients used for both summaries and answers.
//!
//! Each adapter issues a single non-streaming request per prompt and never retries; a failed
//! call surfaces immediately to the caller. The Vertex client targets Gemini publisher models;
//! the Ollama client talks to a local runtime over its `/api/generate` endpoint.

mod prompt;

pub use prompt::{PromptError, PromptTemplate};

use crate::config::{Config, GenerationProvider};
use crate::vertex::VertexTransport;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while calling a text-generation model.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was unreachable or could not be constructed.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Prompt could not be rendered from its template.
    #[error("Failed to render prompt: {0}")]
    Prompt(#[from] PromptError),
}

/// Interface implemented by text-generation providers.
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    /// Produce a completion for a fully rendered prompt.
    async fn generate(&self, prompt: String) -> Result<String, GenerationClientError>;
}

/// Build a generation client based on configuration.
pub fn get_generation_client(
    config: &Config,
) -> Result<Arc<dyn TextGenerationClient>, GenerationClientError> {
    tracing::debug!(
        provider = ?config.generation_provider,
        model = %config.generation_model,
        "Building generation client"
    );
    let client: Arc<dyn TextGenerationClient> = match config.generation_provider {
        GenerationProvider::Vertex => {
            let transport = VertexTransport::new(&config.google, "docrag/generation")
                .map_err(|error| GenerationClientError::ProviderUnavailable(error.to_string()))?;
            Arc::new(VertexGenerationClient::new(
                transport,
                config.generation_model.clone(),
            ))
        }
        GenerationProvider::Ollama => Arc::new(OllamaGenerationClient::new(
            config.ollama_url.clone(),
            config.generation_model.clone(),
        )?),
    };
    Ok(client)
}

/// Gemini client calling Vertex AI `generateContent`.
pub struct VertexGenerationClient {
    transport: VertexTransport,
    model: String,
}

impl VertexGenerationClient {
    /// Create a client for `model` using the given transport.
    pub fn new(transport: VertexTransport, model: String) -> Self {
        Self { transport, model }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl TextGenerationClient for VertexGenerationClient {
    async fn generate(&self, prompt: String) -> Result<String, GenerationClientError> {
        let payload = json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ]
        });

        let response = self
            .transport
            .post(&self.model, "generateContent")
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Vertex AI: {error}"
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Vertex returned {status}: {body}"
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Vertex response: {error}"
            ))
        })?;

        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| {
                GenerationClientError::InvalidResponse("response contained no candidates".into())
            })?;

        Ok(content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<String>())
    }
}

/// Client for a local Ollama runtime.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerationClient {
    /// Create a client for `model` served at `base_url`.
    pub fn new(base_url: String, model: String) -> Result<Self, GenerationClientError> {
        let http = Client::builder()
            .user_agent("docrag/generation")
            .build()
            .map_err(|error| GenerationClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl TextGenerationClient for OllamaGenerationClient {
    async fn generate(&self, prompt: String) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleCloudConfig;
    use httpmock::{Method::POST, MockServer};

    fn vertex_client(base_url: String) -> VertexGenerationClient {
        let transport = VertexTransport::new(
            &GoogleCloudConfig {
                project_id: Some("demo".into()),
                region: "us-central1".into(),
                api_key: None,
                access_token: Some("token-123".into()),
            },
            "docrag-test",
        )
        .expect("transport")
        .with_base_url(base_url);
        VertexGenerationClient::new(transport, "gemini-pro-vision".into())
    }

    #[tokio::test]
    async fn vertex_client_joins_candidate_parts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/projects/demo/locations/us-central1/publishers/google/models/gemini-pro-vision:generateContent")
                    .header("authorization", "Bearer token-123")
                    .body_contains("Summarize");
                then.status(200).json_body(json!({
                    "candidates": [
                        { "content": { "role": "model", "parts": [ { "text": "Blue " }, { "text": "sky." } ] } }
                    ]
                }));
            })
            .await;

        let text = vertex_client(server.base_url())
            .generate("Summarize this".into())
            .await
            .expect("text");

        mock.assert();
        assert_eq!(text, "Blue sky.");
    }

    #[tokio::test]
    async fn vertex_client_rejects_empty_candidates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains(":generateContent");
                then.status(200).json_body(json!({ "candidates": [] }));
            })
            .await;

        let error = vertex_client(server.base_url())
            .generate("hello".into())
            .await
            .expect_err("no candidates");

        assert!(matches!(error, GenerationClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn vertex_client_surfaces_quota_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains(":generateContent");
                then.status(429).body("quota exceeded");
            })
            .await;

        let error = vertex_client(server.base_url())
            .generate("hello".into())
            .await
            .expect_err("quota");

        assert!(
            matches!(error, GenerationClientError::GenerationFailed(message) if message.contains("429"))
        );
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client = OllamaGenerationClient::new(server.base_url(), "llama3".into())
            .expect("client");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).json_body(json!({
                    "response": "Summary text",
                    "done": true
                }));
            })
            .await;

        let summary = client.generate("Summarize".into()).await.expect("summary");

        mock.assert();
        assert_eq!(summary, "Summary text");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        let client = OllamaGenerationClient::new(server.base_url(), "llama3".into())
            .expect("client");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client.generate("Summarize".into()).await.expect_err("error");

        assert!(
            matches!(error, GenerationClientError::GenerationFailed(message) if message.contains("500"))
        );
    }
}
