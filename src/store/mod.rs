//! Two-tier index: summary vectors plus full source documents.
//!
//! Summaries live in a [`VectorIndex`] and are searchable by embedding distance. The documents
//! they were derived from live in a [`ByteStore`] as serialized payloads. Both sides share a
//! [`DocumentId`] generated at write time, which the retriever uses as the join key.

mod memory;
mod qdrant;

pub use memory::{InMemoryByteStore, InMemoryVectorIndex};
pub use qdrant::QdrantVectorIndex;

use crate::embedding::EmbeddingClientError;
use crate::qdrant::QdrantError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Confirmation returned by a successful [`IndexStore::store`].
pub const STORE_CONFIRMATION: &str = "Documents stored successfully";

/// Errors raised by the index store and its backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `store` was called with differently sized inputs.
    #[error("Got {summaries} summaries for {documents} documents")]
    LengthMismatch {
        /// Number of summaries supplied.
        summaries: usize,
        /// Number of documents supplied.
        documents: usize,
    },
    /// Embedding provider failed while indexing or querying.
    #[error("Failed to embed text: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant request failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Stored document could not be encoded or decoded.
    #[error("Failed to (de)serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Backend-specific failure.
    #[error("{backend} store failed: {message}")]
    Backend {
        /// Backend name.
        backend: String,
        /// Failure detail.
        message: String,
    },
}

/// Text unit produced by the loader: one page of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Extracted text.
    pub page_content: String,
    /// Free-form metadata (`source`, `page`, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Build a document from text and metadata.
    pub fn new(page_content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }
}

/// Opaque identifier shared by a summary and the document it summarizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Searchable proxy for a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDocument {
    /// Summary text; this is what gets embedded.
    pub page_content: String,
    /// Identifier of the summarized document.
    pub doc_id: DocumentId,
}

/// Nearest-neighbour index over summary text.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and insert a batch of summaries.
    async fn add_documents(&self, documents: Vec<SummaryDocument>) -> Result<(), StoreError>;

    /// Return up to `k` summaries closest to `query`, best match first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SummaryDocument>, StoreError>;

    /// Remove summaries by document identifier.
    async fn delete(&self, ids: &[DocumentId]) -> Result<(), StoreError>;
}

/// Key-value store of serialized payloads.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Write a batch of entries.
    async fn mset(&self, entries: Vec<(DocumentId, Vec<u8>)>) -> Result<(), StoreError>;

    /// Read entries by key; missing keys yield `None` in the same position.
    async fn mget(&self, ids: &[DocumentId]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;
}

/// Writes summaries and documents into their respective tiers and reads them back.
#[derive(Clone)]
pub struct IndexStore {
    vectors: Arc<dyn VectorIndex>,
    documents: Arc<dyn ByteStore>,
}

impl IndexStore {
    /// Combine a vector index and a byte store.
    pub fn new(vectors: Arc<dyn VectorIndex>, documents: Arc<dyn ByteStore>) -> Self {
        Self { vectors, documents }
    }

    /// Persist `summaries[i]` as the searchable proxy of `documents[i]`.
    ///
    /// Summaries are written first, then documents. When the document write fails the freshly
    /// written summaries are deleted again so no summary points at a missing document; if that
    /// cleanup also fails the stores stay inconsistent and the original error is returned.
    pub async fn store(
        &self,
        summaries: Vec<String>,
        documents: Vec<Document>,
    ) -> Result<&'static str, StoreError> {
        if summaries.len() != documents.len() {
            return Err(StoreError::LengthMismatch {
                summaries: summaries.len(),
                documents: documents.len(),
            });
        }
        if documents.is_empty() {
            return Ok(STORE_CONFIRMATION);
        }

        let ids: Vec<DocumentId> = documents.iter().map(|_| DocumentId::generate()).collect();
        let entries = ids
            .iter()
            .cloned()
            .zip(documents.iter())
            .map(|(id, document)| serde_json::to_vec(document).map(|bytes| (id, bytes)))
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        let summary_docs: Vec<SummaryDocument> = summaries
            .into_iter()
            .zip(ids.iter().cloned())
            .map(|(page_content, doc_id)| SummaryDocument {
                page_content,
                doc_id,
            })
            .collect();

        self.vectors.add_documents(summary_docs).await?;

        if let Err(error) = self.documents.mset(entries).await {
            tracing::error!(
                error = %error,
                count = ids.len(),
                "Document write failed; removing summaries"
            );
            if let Err(cleanup) = self.vectors.delete(&ids).await {
                tracing::error!(
                    error = %cleanup,
                    count = ids.len(),
                    "Summary cleanup failed; index now holds orphaned summaries"
                );
            }
            return Err(error);
        }

        tracing::info!(documents = ids.len(), "Documents stored");
        Ok(STORE_CONFIRMATION)
    }

    /// Search the summary tier.
    pub async fn search_summaries(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SummaryDocument>, StoreError> {
        self.vectors.similarity_search(query, k).await
    }

    /// Resolve identifiers to full documents, preserving order.
    pub async fn get_documents(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<Option<Document>>, StoreError> {
        self.documents
            .mget(ids)
            .await?
            .into_iter()
            .map(|bytes| {
                bytes
                    .map(|bytes| serde_json::from_slice(&bytes))
                    .transpose()
                    .map_err(StoreError::from)
            })
            .collect()
    }
}
