//! Batch summarization with a cap on in-flight model calls.

use crate::generation::{GenerationClientError, PromptTemplate, TextGenerationClient};
use crate::store::Document;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Prompt used for every page summary.
pub const SUMMARY_TEMPLATE: &str = "Summarize the following document:\n\n{doc}";

/// Default cap on concurrent summarization requests.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Errors raised while summarizing a batch.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// A model call failed; the whole batch is abandoned.
    #[error("Summary for document {index} failed: {source}")]
    Generation {
        /// Position of the failing document in the batch.
        index: usize,
        /// Underlying client failure.
        #[source]
        source: GenerationClientError,
    },
    /// A summarization task was cancelled or panicked.
    #[error("Summarization task failed: {0}")]
    Task(String),
}

/// Produces one summary per document, in input order.
#[derive(Clone)]
pub struct Summarizer {
    client: Arc<dyn TextGenerationClient>,
    template: PromptTemplate,
    max_concurrency: usize,
}

impl Summarizer {
    /// Build a summarizer allowing at most `max_concurrency` outstanding calls (minimum one).
    pub fn new(client: Arc<dyn TextGenerationClient>, max_concurrency: usize) -> Self {
        Self {
            client,
            template: PromptTemplate::new(SUMMARY_TEMPLATE),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Summarize every document.
    ///
    /// Calls are fanned out behind a semaphore and joined before returning. The first failure
    /// aborts the tasks still running and fails the batch; there are no retries.
    pub async fn summarize(&self, documents: &[Document]) -> Result<Vec<String>, SummarizeError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, document) in documents.iter().enumerate() {
            let prompt = self
                .template
                .format(&[("doc", document.page_content.as_str())])
                .map_err(|error| SummarizeError::Generation {
                    index,
                    source: error.into(),
                })?;
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|error| SummarizeError::Task(error.to_string()))?;
                let summary = client
                    .generate(prompt)
                    .await
                    .map_err(|source| SummarizeError::Generation { index, source })?;
                Ok::<_, SummarizeError>((index, summary))
            });
        }

        let mut summaries: Vec<Option<String>> = vec![None; documents.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, summary) =
                joined.map_err(|error| SummarizeError::Task(error.to_string()))??;
            summaries[index] = Some(summary);
        }

        tracing::debug!(
            documents = documents.len(),
            max_concurrency = self.max_concurrency,
            "Summaries generated"
        );

        summaries
            .into_iter()
            .enumerate()
            .map(|(index, summary)| {
                summary.ok_or_else(|| SummarizeError::Task(format!("summary {index} missing")))
            })
            .collect()
    }
}
