#[cfg(test)]
mod tests;

use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::index::{SearchResult, VectorStore};
use crate::llm::GroqClient;
use crate::{QaError, Result};

/// Answer returned when retrieval comes back empty or the model declines.
pub const FALLBACK_MESSAGE: &str = "No relevant Confluence document found.\n\n\
    Please ask a question based on the Confluence documentation.";

/// Substrings that mark a model reply as a refusal rather than an answer.
///
/// This is a heuristic, not a confidence score: an answer that legitimately
/// contains one of these phrases will be misclassified.
const LOW_CONFIDENCE_PHRASES: &[&str] = &[
    "no relevant",
    "i don't know",
    "does not mention",
    "no information",
    "cannot find",
    "not found",
];

/// A grounded answer with the documents it was drawn from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Source documents, deduplicated by link in first-seen order. Empty
    /// when the fallback fired.
    pub sources: Vec<SourceRef>,
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub title: String,
    pub link: String,
}

impl Answer {
    fn fallback() -> Self {
        Self {
            text: FALLBACK_MESSAGE.to_string(),
            sources: Vec::new(),
            fallback: true,
        }
    }

    /// Deduplicated source links, preserving retrieval order.
    #[inline]
    pub fn links(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| source.link.clone())
            .collect()
    }
}

/// Question-answering pipeline: embed the question, retrieve the nearest
/// chunks, and compose a grounded answer through the LLM.
pub struct QaPipeline {
    store: VectorStore,
    embedder: Arc<OllamaClient>,
    llm: Arc<GroqClient>,
    top_k: usize,
}

impl QaPipeline {
    #[inline]
    pub async fn build(config: &Config) -> Result<Self> {
        let store = VectorStore::open(config).await?;
        let embedder = Arc::new(OllamaClient::new(&config.ollama)?);
        let llm = Arc::new(GroqClient::new(&config.groq));

        Ok(Self {
            store,
            embedder,
            llm,
            top_k: config.retrieval.top_k,
        })
    }

    /// Answer one question.
    ///
    /// The fallback answer is returned when retrieval finds nothing (a
    /// fresh or empty index included) or when the model's reply is empty
    /// or matches a refusal phrase.
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim().to_string();

        let embedder = Arc::clone(&self.embedder);
        let query = question.clone();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed(&query))
            .await
            .map_err(|e| QaError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| QaError::Embedding(format!("Failed to embed question: {:#}", e)))?;

        let results = self.store.search(&query_vector, self.top_k).await?;
        if results.is_empty() {
            info!("No chunks retrieved; returning fallback answer");
            return Ok(Answer::fallback());
        }

        debug!("Retrieved {} chunks for question", results.len());

        let prompt = build_prompt(&results, &question);
        let llm = Arc::clone(&self.llm);
        let reply = tokio::task::spawn_blocking(move || llm.complete(&prompt))
            .await
            .map_err(|e| QaError::Llm(format!("Completion task failed: {}", e)))?
            .map_err(|e| QaError::Llm(format!("Failed to get completion: {:#}", e)))?;

        if reply.trim().is_empty() || is_low_confidence(&reply) {
            info!("Model reply classified as low confidence; returning fallback answer");
            return Ok(Answer::fallback());
        }

        Ok(Answer {
            text: reply,
            sources: collect_sources(&results),
            fallback: false,
        })
    }

    /// Number of chunks currently indexed.
    #[inline]
    pub async fn indexed_chunks(&self) -> Result<u64> {
        self.store.count().await
    }

    #[cfg(test)]
    fn with_groq_url(mut self, url: &str) -> Self {
        let llm = (*self.llm).clone().with_completions_url(url);
        self.llm = Arc::new(llm);
        self
    }
}

/// Whether a model reply reads as a refusal (case-insensitive substring
/// match against the fixed phrase list).
#[inline]
pub fn is_low_confidence(reply: &str) -> bool {
    let lowered = reply.to_lowercase();
    LOW_CONFIDENCE_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Compose the grounded prompt: instructions, retrieved context, then the
/// question.
fn build_prompt(results: &[SearchResult], question: &str) -> String {
    let context = results
        .iter()
        .map(|result| result.content.as_str())
        .join("\n\n");

    format!(
        "You are a helpful assistant answering questions from Confluence documentation.\n\n\
         If you don't know the answer or if the question is unrelated to the documents, say:\n\
         \"I don't know the answer to that. Please ask a question based on the Confluence documents.\"\n\n\
         Use the following context:\n\
         {context}\n\n\
         Question: {question}\n\
         Answer (with brief explanation):"
    )
}

fn collect_sources(results: &[SearchResult]) -> Vec<SourceRef> {
    results
        .iter()
        .map(|result| SourceRef {
            title: result.metadata.source.clone(),
            link: result.metadata.link.clone(),
        })
        .unique_by(|source| source.link.clone())
        .collect()
}
