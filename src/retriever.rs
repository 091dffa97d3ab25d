//! Resolves a question to full documents through their summaries.

use crate::store::{Document, IndexStore, StoreError};

/// Searches the summary tier and returns the documents behind the best matches.
#[derive(Clone)]
pub struct MultiVectorRetriever {
    store: IndexStore,
}

impl MultiVectorRetriever {
    /// Build a retriever over `store`.
    pub fn new(store: IndexStore) -> Self {
        Self { store }
    }

    /// Return up to `k` documents whose summaries are closest to `question`, best first.
    ///
    /// An empty index yields an empty vector. Summaries whose document cannot be found are
    /// skipped with a warning.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Document>, StoreError> {
        let summaries = self.store.search_summaries(question, k).await?;
        if summaries.is_empty() {
            tracing::debug!("No summaries matched; index is empty");
            return Ok(Vec::new());
        }

        let ids: Vec<_> = summaries.iter().map(|summary| summary.doc_id.clone()).collect();
        let resolved = self.store.get_documents(&ids).await?;

        let documents: Vec<Document> = ids
            .iter()
            .zip(resolved)
            .filter_map(|(id, document)| {
                if document.is_none() {
                    tracing::warn!(doc_id = %id, "Summary references a missing document");
                }
                document
            })
            .collect();

        tracing::debug!(
            matched = summaries.len(),
            resolved = documents.len(),
            "Retrieved documents"
        );
        Ok(documents)
    }
}
