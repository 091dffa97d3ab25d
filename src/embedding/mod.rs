use crate::config::{Config, EmbeddingProvider};
use crate::vertex::VertexTransport;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unreachable or could not be constructed.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one embedding vector per supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client suitable for the supplied configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Building embedding client"
    );
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Vertex => {
            let transport = VertexTransport::new(&config.google, "docrag/embedding")
                .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;
            Arc::new(VertexEmbeddingClient::new(
                transport,
                config.embedding_model.clone(),
            ))
        }
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
        )?),
        EmbeddingProvider::Hash => Arc::new(HashEmbeddingClient::new(config.embedding_dimension)),
    };
    Ok(client)
}

/// Vertex AI text embedding client (`text-embedding-004` and friends).
pub struct VertexEmbeddingClient {
    transport: VertexTransport,
    model: String,
}

impl VertexEmbeddingClient {
    /// Create a client for `model` using the given transport.
    pub fn new(transport: VertexTransport, model: String) -> Self {
        Self { transport, model }
    }
}

#[derive(Deserialize)]
struct VertexPredictResponse {
    #[serde(default)]
    predictions: Vec<VertexPrediction>,
}

#[derive(Deserialize)]
struct VertexPrediction {
    embeddings: VertexEmbeddingValues,
}

#[derive(Deserialize)]
struct VertexEmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for VertexEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let instances: Vec<_> = texts
            .into_iter()
            .map(|text| json!({ "content": text }))
            .collect();

        tracing::debug!(model = %self.model, inputs = expected, "Requesting Vertex embeddings");
        let response = self
            .transport
            .post(&self.model, "predict")
            .json(&json!({ "instances": instances }))
            .send()
            .await
            .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Vertex returned {status}: {body}"
            )));
        }

        let body: VertexPredictResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingClientError::InvalidResponse(error.to_string()))?;
        let vectors: Vec<Vec<f32>> = body
            .predictions
            .into_iter()
            .map(|prediction| prediction.embeddings.values)
            .collect();
        ensure_count(expected, vectors)
    }
}

/// Embedding client backed by a local Ollama runtime.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Create a client for `model` served at `base_url`.
    pub fn new(base_url: String, model: String) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("docrag/embedding")
            .build()
            .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let response = self
            .http
            .post(self.endpoint())
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingClientError::InvalidResponse(error.to_string()))?;
        ensure_count(expected, body.embeddings)
    }
}

/// Deterministic embedding client that hashes bytes into a fixed-size vector.
///
/// Needs no network access, which makes it the backend for offline runs and tests.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a client producing vectors of `dimension` slots.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

fn ensure_count(
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if vectors.len() != expected {
        return Err(EmbeddingClientError::GenerationFailed(format!(
            "expected {expected} embeddings, provider returned {}",
            vectors.len()
        )));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleCloudConfig;
    use httpmock::{Method::POST, MockServer};

    fn vertex_transport(base_url: String) -> VertexTransport {
        VertexTransport::new(
            &GoogleCloudConfig {
                project_id: Some("demo".into()),
                region: "us-central1".into(),
                api_key: Some("secret".into()),
                access_token: None,
            },
            "docrag-test",
        )
        .expect("transport")
        .with_base_url(base_url)
    }

    #[tokio::test]
    async fn hash_client_is_deterministic_and_normalized() {
        let client = HashEmbeddingClient::new(16);
        let first = client
            .generate_embeddings(vec!["The sky is blue.".into()])
            .await
            .expect("embeddings");
        let second = client
            .generate_embeddings(vec!["The sky is blue.".into()])
            .await
            .expect("embeddings");

        assert_eq!(first, second);
        let norm: f32 = first[0].iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn vertex_client_parses_predictions() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/projects/demo/locations/us-central1/publishers/google/models/text-embedding-004:predict")
                    .header("x-goog-api-key", "secret");
                then.status(200).json_body(json!({
                    "predictions": [
                        { "embeddings": { "values": [0.1, 0.2] } },
                        { "embeddings": { "values": [0.3, 0.4] } }
                    ]
                }));
            })
            .await;

        let client = VertexEmbeddingClient::new(
            vertex_transport(server.base_url()),
            "text-embedding-004".into(),
        );
        let vectors = client
            .generate_embeddings(vec!["one".into(), "two".into()])
            .await
            .expect("vectors");

        mock.assert();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn vertex_client_rejects_short_batches() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains(":predict");
                then.status(200).json_body(json!({
                    "predictions": [ { "embeddings": { "values": [0.1] } } ]
                }));
            })
            .await;

        let client = VertexEmbeddingClient::new(
            vertex_transport(server.base_url()),
            "text-embedding-004".into(),
        );
        let error = client
            .generate_embeddings(vec!["one".into(), "two".into()])
            .await
            .expect_err("count mismatch");

        assert!(matches!(error, EmbeddingClientError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn ollama_client_reports_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("boom");
            })
            .await;

        let client = OllamaEmbeddingClient::new(server.base_url(), "nomic-embed-text".into())
            .expect("client");
        let error = client
            .generate_embeddings(vec!["hello".into()])
            .await
            .expect_err("error status");

        assert!(
            matches!(error, EmbeddingClientError::GenerationFailed(message) if message.contains("500"))
        );
    }
}
