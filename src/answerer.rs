//! Final answer generation from retrieved context.

use crate::generation::{GenerationClientError, PromptTemplate, TextGenerationClient};
use crate::store::Document;
use std::sync::Arc;

/// Prompt used to answer a question from a single context document.
pub const ANSWER_TEMPLATE: &str =
    "Answer the following question based on this context:\n\n{context}\n\nQuestion: {question}\n";

/// Asks the model to answer a question from retrieved documents.
#[derive(Clone)]
pub struct Answerer {
    client: Arc<dyn TextGenerationClient>,
    template: PromptTemplate,
}

impl Answerer {
    /// Build an answerer calling `client`.
    pub fn new(client: Arc<dyn TextGenerationClient>) -> Self {
        Self {
            client,
            template: PromptTemplate::new(ANSWER_TEMPLATE),
        }
    }

    /// Render the answer prompt. Only the first document is used as context; with no
    /// documents the context is empty.
    pub fn build_prompt(
        &self,
        question: &str,
        context: &[Document],
    ) -> Result<String, GenerationClientError> {
        let context = format_context(context);
        Ok(self
            .template
            .format(&[("context", context), ("question", question)])?)
    }

    /// Generate the raw model answer.
    pub async fn answer(
        &self,
        question: &str,
        context: &[Document],
    ) -> Result<String, GenerationClientError> {
        let prompt = self.build_prompt(question, context)?;
        self.client.generate(prompt).await
    }
}

fn format_context(documents: &[Document]) -> &str {
    documents
        .first()
        .map(|document| document.page_content.as_str())
        .unwrap_or("")
}
