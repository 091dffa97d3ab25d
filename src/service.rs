//! Service wiring loader, summarizer, index store, retriever, and answerer together.

use crate::{
    answerer::Answerer,
    config::{Config, VectorIndexBackend},
    embedding::{EmbeddingClientError, get_embedding_client},
    generation::{GenerationClientError, TextGenerationClient, get_generation_client},
    loader::{DocumentLoader, LoaderError, UploadedFile},
    metrics::{MetricsSnapshot, RagMetrics},
    qdrant::{QdrantError, QdrantService},
    retriever::MultiVectorRetriever,
    store::{
        Document, InMemoryByteStore, InMemoryVectorIndex, IndexStore, QdrantVectorIndex,
        StoreError, VectorIndex,
    },
    summarizer::{SummarizeError, Summarizer},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors emitted by the upload and answer pipelines.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Uploaded file could not be parsed.
    #[error("Failed to load upload: {0}")]
    Loader(#[from] LoaderError),
    /// Summarization batch failed.
    #[error("Failed to summarize documents: {0}")]
    Summarize(#[from] SummarizeError),
    /// Index store read or write failed.
    #[error("Index store failure: {0}")]
    Store(#[from] StoreError),
    /// Answer generation failed.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationClientError),
    /// Embedding client could not be built.
    #[error("Failed to initialize embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant client could not be built.
    #[error("Failed to initialize Qdrant: {0}")]
    Qdrant(#[from] QdrantError),
}

/// Abstraction over the pipelines used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Load, summarize, and store the uploaded files, returning a confirmation message.
    async fn upload(&self, files: Vec<UploadedFile>) -> Result<String, ServiceError>;

    /// Answer a question from the closest stored document.
    async fn answer(&self, question: String) -> Result<String, ServiceError>;

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Tunables for the two pipelines.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Maximum number of concurrent summarization calls.
    pub summary_max_concurrency: usize,
    /// Number of summaries retrieved per question.
    pub retrieval_top_k: usize,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            summary_max_concurrency: config.summary_max_concurrency,
            retrieval_top_k: config.retrieval_top_k,
        }
    }
}

/// Owns every pipeline component for the lifetime of the service.
///
/// Construct once near process start and share through an `Arc`; concurrent requests hit the
/// same stores without any local locking beyond what the backends do themselves.
pub struct RagService {
    loader: DocumentLoader,
    summarizer: Summarizer,
    store: IndexStore,
    retriever: MultiVectorRetriever,
    answerer: Answerer,
    top_k: usize,
    metrics: Arc<RagMetrics>,
}

impl RagService {
    /// Assemble a service from explicit components.
    pub fn new(
        loader: DocumentLoader,
        generator: Arc<dyn TextGenerationClient>,
        store: IndexStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            loader,
            summarizer: Summarizer::new(Arc::clone(&generator), settings.summary_max_concurrency),
            retriever: MultiVectorRetriever::new(store.clone()),
            store,
            answerer: Answerer::new(generator),
            top_k: settings.retrieval_top_k.max(1),
            metrics: Arc::new(RagMetrics::new()),
        }
    }

    /// Build providers and backends selected by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, ServiceError> {
        tracing::info!("Initializing embedding client");
        let embeddings = get_embedding_client(config)?;
        tracing::info!("Initializing generation client");
        let generator = get_generation_client(config)?;

        let vectors: Arc<dyn VectorIndex> = match config.vector_index {
            VectorIndexBackend::Memory => Arc::new(InMemoryVectorIndex::new(embeddings)),
            VectorIndexBackend::Qdrant => {
                let url = config.qdrant_url.as_deref().unwrap_or_default();
                let qdrant = QdrantService::new(url, config.qdrant_api_key.clone())?;
                Arc::new(
                    QdrantVectorIndex::connect(
                        qdrant,
                        embeddings,
                        config.qdrant_collection_name.clone(),
                        config.embedding_dimension as u64,
                    )
                    .await?,
                )
            }
        };
        tracing::info!(vector_index = ?config.vector_index, "Index store ready");
        let store = IndexStore::new(vectors, Arc::new(InMemoryByteStore::new()));

        Ok(Self::new(
            DocumentLoader::new(),
            generator,
            store,
            PipelineSettings::from(config),
        ))
    }

    /// Parse uploads into page documents.
    pub async fn upload_documents(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<Document>, ServiceError> {
        Ok(self.loader.load(files).await?)
    }

    /// Summarize documents, one summary per document in the same order.
    pub async fn create_summaries(
        &self,
        documents: &[Document],
    ) -> Result<Vec<String>, ServiceError> {
        Ok(self.summarizer.summarize(documents).await?)
    }

    /// Write summaries and their documents to the index store.
    pub async fn store_docs(
        &self,
        summaries: Vec<String>,
        documents: Vec<Document>,
    ) -> Result<String, ServiceError> {
        Ok(self.store.store(summaries, documents).await?.to_string())
    }

    /// Run the full upload pipeline.
    pub async fn upload(&self, files: Vec<UploadedFile>) -> Result<String, ServiceError> {
        let file_count = files.len();
        tracing::info!(files = file_count, "Processing upload");
        let documents = self.upload_documents(files).await?;
        let summaries = self.create_summaries(&documents).await?;
        let document_count = documents.len();
        let confirmation = self.store_docs(summaries, documents).await?;

        self.metrics.record_upload(file_count as u64, document_count as u64);
        tracing::info!(files = file_count, documents = document_count, "Upload indexed");
        Ok(confirmation)
    }

    /// Retrieve the closest document and ask the model to answer from it.
    pub async fn generate_answer(&self, question: &str) -> Result<String, ServiceError> {
        let documents = self.retriever.retrieve(question, self.top_k).await?;
        tracing::info!(retrieved = documents.len(), "Answering question");
        let answer = self.answerer.answer(question, &documents).await?;
        self.metrics.record_answer(documents.is_empty());
        Ok(answer)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn upload(&self, files: Vec<UploadedFile>) -> Result<String, ServiceError> {
        RagService::upload(self, files).await
    }

    async fn answer(&self, question: String) -> Result<String, ServiceError> {
        RagService::generate_answer(self, &question).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingProvider, GenerationProvider};
    use crate::embedding::HashEmbeddingClient;
    use crate::loader::PageExtractor;
    use std::path::Path;
    use tokio::sync::Mutex;

    struct Utf8Pages;

    impl PageExtractor for Utf8Pages {
        fn extract_pages(&self, path: &Path) -> Result<Vec<String>, String> {
            let raw = std::fs::read_to_string(path).map_err(|error| error.to_string())?;
            Ok(raw.split('\x0C').map(str::to_string).collect())
        }
    }

    /// Summaries are the page text upper-cased; answers echo the prompt.
    #[derive(Default)]
    struct ScriptedModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerationClient for ScriptedModel {
        async fn generate(&self, prompt: String) -> Result<String, GenerationClientError> {
            self.prompts.lock().await.push(prompt.clone());
            if let Some(doc) = prompt.strip_prefix("Summarize the following document:\n\n") {
                return Ok(doc.to_uppercase());
            }
            Ok(format!("answer from: {prompt}"))
        }
    }

    fn service(model: Arc<ScriptedModel>) -> RagService {
        let store = IndexStore::new(
            Arc::new(InMemoryVectorIndex::new(Arc::new(HashEmbeddingClient::new(64)))),
            Arc::new(InMemoryByteStore::new()),
        );
        RagService::new(
            DocumentLoader::with_extractor(Arc::new(Utf8Pages)),
            model,
            store,
            PipelineSettings {
                summary_max_concurrency: 5,
                retrieval_top_k: 1,
            },
        )
    }

    #[tokio::test]
    async fn upload_then_answer_uses_stored_page() {
        let model = Arc::new(ScriptedModel::default());
        let service = service(model.clone());

        let confirmation = service
            .upload(vec![UploadedFile::new("sky.pdf", "The sky is blue.")])
            .await
            .expect("upload");
        assert_eq!(confirmation, "Documents stored successfully");

        let answer = service
            .generate_answer("THE SKY IS BLUE.")
            .await
            .expect("answer");
        assert!(answer.contains("The sky is blue."));

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.files_uploaded, 1);
        assert_eq!(snapshot.documents_stored, 1);
        assert_eq!(snapshot.questions_answered, 1);
        assert_eq!(snapshot.empty_retrievals, 0);
    }

    #[tokio::test]
    async fn answering_before_any_upload_uses_empty_context() {
        let model = Arc::new(ScriptedModel::default());
        let service = service(model.clone());

        let answer = service.generate_answer("Anything?").await.expect("answer");

        assert!(answer.contains("context:\n\n\n\nQuestion: Anything?"));
        assert_eq!(service.metrics_snapshot().empty_retrievals, 1);
    }

    #[tokio::test]
    async fn from_config_builds_local_stack() {
        let config = Config {
            embedding_provider: EmbeddingProvider::Hash,
            generation_provider: GenerationProvider::Ollama,
            ..Config::default()
        };

        let service = RagService::from_config(&config).await.expect("service");
        assert_eq!(service.top_k, 1);
    }
}
