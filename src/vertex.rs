//! Shared request plumbing for Vertex AI publisher models.

use crate::config::GoogleCloudConfig;
use reqwest::{Client, RequestBuilder};

/// Resolved Vertex AI endpoint plus the credentials attached to each request.
#[derive(Clone)]
pub struct VertexTransport {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) project_id: String,
    pub(crate) region: String,
    pub(crate) api_key: Option<String>,
    pub(crate) access_token: Option<String>,
}

impl VertexTransport {
    /// Build a transport targeting the regional `aiplatform.googleapis.com` host.
    pub fn new(google: &GoogleCloudConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(user_agent).build()?;
        let region = google.region.clone();
        Ok(Self {
            http,
            base_url: format!("https://{region}-aiplatform.googleapis.com/v1"),
            project_id: google.project_id.clone().unwrap_or_default(),
            region,
            api_key: google.api_key.clone(),
            access_token: google.access_token.clone(),
        })
    }

    /// Point the transport at a different host, keeping project and credentials.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full URL of `model:method` under the configured project and region.
    pub fn model_url(&self, model: &str, method: &str) -> String {
        let model_id = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{model_id}:{method}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.region,
        )
    }

    /// Start a POST to `model:method` with credentials applied.
    pub fn post(&self, model: &str, method: &str) -> RequestBuilder {
        let request = self.http.post(self.model_url(model, method));
        if let Some(token) = self.access_token.as_deref().filter(|value| !value.is_empty()) {
            request.bearer_auth(token)
        } else if let Some(key) = self.api_key.as_deref().filter(|value| !value.is_empty()) {
            request.header("x-goog-api-key", key)
        } else {
            request
        }
    }
}
