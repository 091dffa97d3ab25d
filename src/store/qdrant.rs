//! Qdrant-backed summary index.

use super::{DocumentId, StoreError, SummaryDocument, VectorIndex};
use crate::embedding::EmbeddingClient;
use crate::qdrant::{PointInsert, QdrantService, payload::read_summary};
use async_trait::async_trait;
use std::sync::Arc;

/// Summary index stored in a Qdrant collection.
///
/// Each summary becomes one point whose id is the document identifier, so deletes address
/// points directly.
pub struct QdrantVectorIndex {
    qdrant: QdrantService,
    embeddings: Arc<dyn EmbeddingClient>,
    collection: String,
}

impl QdrantVectorIndex {
    /// Connect to `collection`, creating it with `vector_size` dimensions when missing.
    pub async fn connect(
        qdrant: QdrantService,
        embeddings: Arc<dyn EmbeddingClient>,
        collection: String,
        vector_size: u64,
    ) -> Result<Self, StoreError> {
        qdrant
            .create_collection_if_not_exists(&collection, vector_size)
            .await?;
        tracing::debug!(collection = %collection, vector_size, "Summary collection ready");
        Ok(Self {
            qdrant,
            embeddings,
            collection,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn add_documents(&self, documents: Vec<SummaryDocument>) -> Result<(), StoreError> {
        if documents.is_empty() {
            return Ok(());
        }
        let texts = documents
            .iter()
            .map(|doc| doc.page_content.clone())
            .collect();
        let vectors = self.embeddings.generate_embeddings(texts).await?;

        let points = documents
            .into_iter()
            .zip(vectors)
            .map(|(summary, vector)| PointInsert {
                id: summary.doc_id.as_str().to_owned(),
                text: summary.page_content,
                vector,
            })
            .collect();
        self.qdrant.upsert_points(&self.collection, points).await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SummaryDocument>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(vector) = self
            .embeddings
            .generate_embeddings(vec![query.to_string()])
            .await?
            .pop()
        else {
            return Ok(Vec::new());
        };

        let hits = self
            .qdrant
            .search_points(&self.collection, vector, k)
            .await?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let summary = hit.payload.as_ref().and_then(read_summary);
                if summary.is_none() {
                    tracing::warn!(point = %hit.id, "Summary point missing doc_id payload");
                }
                summary
            })
            .map(|(doc_id, page_content)| SummaryDocument {
                page_content,
                doc_id: DocumentId::from(doc_id),
            })
            .collect())
    }

    async fn delete(&self, ids: &[DocumentId]) -> Result<(), StoreError> {
        let ids = ids.iter().map(|id| id.as_str().to_owned()).collect();
        self.qdrant.delete_points(&self.collection, ids).await?;
        Ok(())
    }
}
