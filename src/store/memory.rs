//! Process-local backends for both index tiers.

use super::{ByteStore, DocumentId, StoreError, SummaryDocument, VectorIndex};
use crate::embedding::EmbeddingClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct IndexedSummary {
    summary: SummaryDocument,
    vector: Vec<f32>,
}

/// Vector index held in memory, scored by cosine similarity.
///
/// Entries keep insertion order, so equal scores rank the older summary first.
pub struct InMemoryVectorIndex {
    embeddings: Arc<dyn EmbeddingClient>,
    entries: RwLock<Vec<IndexedSummary>>,
}

impl InMemoryVectorIndex {
    /// Create an empty index embedding text with `embeddings`.
    pub fn new(embeddings: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            embeddings,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of summaries currently indexed.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the index holds no summaries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Cosine similarity; `0.0` when either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add_documents(&self, documents: Vec<SummaryDocument>) -> Result<(), StoreError> {
        if documents.is_empty() {
            return Ok(());
        }
        let texts = documents
            .iter()
            .map(|doc| doc.page_content.clone())
            .collect();
        let vectors = self.embeddings.generate_embeddings(texts).await?;

        let mut entries = self.entries.write().await;
        entries.extend(
            documents
                .into_iter()
                .zip(vectors)
                .map(|(summary, vector)| IndexedSummary { summary, vector }),
        );
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SummaryDocument>, StoreError> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }
        let query_vector = self
            .embeddings
            .generate_embeddings(vec![query.to_string()])
            .await?
            .pop()
            .unwrap_or_default();

        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &SummaryDocument)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.vector, &query_vector), &entry.summary))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, summary)| summary.clone())
            .collect())
    }

    async fn delete(&self, ids: &[DocumentId]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.retain(|entry| !ids.contains(&entry.summary.doc_id));
        Ok(())
    }
}

/// Byte store held in a `HashMap`.
#[derive(Default)]
pub struct InMemoryByteStore {
    entries: RwLock<HashMap<DocumentId, Vec<u8>>>,
}

impl InMemoryByteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ByteStore for InMemoryByteStore {
    async fn mset(&self, entries: Vec<(DocumentId, Vec<u8>)>) -> Result<(), StoreError> {
        let mut store = self.entries.write().await;
        store.extend(entries);
        Ok(())
    }

    async fn mget(&self, ids: &[DocumentId]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let store = self.entries.read().await;
        Ok(ids.iter().map(|id| store.get(id).cloned()).collect())
    }
}
