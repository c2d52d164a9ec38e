//! Retrieval-augmented answer generation.
//!
//! The vector store and the language model sit behind the [`Retriever`] and
//! [`LlmClient`] traits so the pipeline can run against fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;
use crate::models::audit_record::SourceCitation;

/// A document returned by similarity search, with its raw vector distance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub content: String,
    pub metadata: serde_json::Value,
    pub distance: f64,
}

/// Nearest-neighbour search over the document corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>>;

    async fn heartbeat(&self) -> Result<()> {
        Ok(())
    }
}

/// Text completion by a large language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Text embedding for queries and documents.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Answer language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Id,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Id => "id",
            Language::En => "en",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Language::Id),
            "en" => Some(Language::En),
            _ => None,
        }
    }

    /// Answer returned when retrieval finds nothing to ground on.
    pub fn fallback_answer(&self) -> &'static str {
        match self {
            Language::Id => {
                "Maaf, saya tidak memiliki cukup informasi untuk menjawab pertanyaan ini."
            }
            Language::En => "I don't have enough information to answer this question.",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            Language::En => EN_TEMPLATE,
            Language::Id => ID_TEMPLATE,
        }
    }
}

const EN_TEMPLATE: &str = "You are a helpful AI assistant. Use the following context to answer the question.
If the question is a general greeting (like \"hello\", \"hi\") or not directly related to the specific context provided, please answer politely using your general knowledge.
Do NOT say \"I cannot answer based on context\" for simple social interactions or general questions.

Context:
{context}

Question: {question}

Answer: ";

const ID_TEMPLATE: &str = "Anda adalah asisten AI yang membantu. Gunakan konteks berikut untuk menjawab pertanyaan.
Jika pertanyaan adalah sapaan umum (seperti \"halo\", \"selamat pagi\") atau tidak terkait langsung dengan konteks yang diberikan, silakan jawab dengan sopan menggunakan pengetahuan umum Anda.
JANGAN katakan \"Saya tidak bisa menjawab berdasarkan konteks\" untuk interaksi sosial sederhana atau pertanyaan umum.

Konteks:
{context}

Pertanyaan: {question}

Jawaban: ";

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub confidence_score: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Map a vector distance to a similarity in (0, 1].
pub fn similarity_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Mean similarity of the retrieved documents, clamped to [0, 1].
pub fn confidence_from_distances(distances: &[f64]) -> f64 {
    if distances.is_empty() {
        return 0.0;
    }
    let total: f64 = distances.iter().copied().map(similarity_from_distance).sum();
    let mean = total / distances.len() as f64;
    round4(mean.clamp(0.0, 1.0))
}

/// Fill the language template with the retrieved context and the question.
///
/// Placeholders are resolved in one pass over the template, so braces inside
/// retrieved documents or the question are copied through as-is.
pub fn build_prompt(language: Language, context: &str, question: &str) -> String {
    let mut rest = language.template();
    let mut prompt = String::with_capacity(rest.len() + context.len() + question.len());
    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        rest = &rest[start..];
        if let Some(tail) = rest.strip_prefix("{context}") {
            prompt.push_str(context);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("{question}") {
            prompt.push_str(question);
            rest = tail;
        } else {
            prompt.push('{');
            rest = &rest[1..];
        }
    }
    prompt.push_str(rest);
    prompt
}

pub struct RagService {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
}

impl RagService {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LlmClient>, top_k: usize) -> Self {
        Self {
            retriever,
            llm,
            top_k,
        }
    }

    /// Retrieve supporting documents and generate a grounded answer.
    pub async fn generate(&self, question: &str, language: Language) -> Result<RagAnswer> {
        let documents = self
            .retriever
            .similarity_search(question, self.top_k)
            .await?;
        tracing::debug!(retrieved = documents.len(), "Similarity search complete");

        let distances: Vec<f64> = documents.iter().map(|d| d.distance).collect();
        let confidence_score = confidence_from_distances(&distances);

        let sources: Vec<SourceCitation> = documents
            .iter()
            .map(|d| SourceCitation {
                content: d.content.clone(),
                metadata: d.metadata.clone(),
                similarity_score: round4(similarity_from_distance(d.distance)),
            })
            .collect();

        let answer = if documents.is_empty() {
            language.fallback_answer().to_string()
        } else {
            let context = documents
                .iter()
                .map(|d| d.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            self.llm
                .complete(&build_prompt(language, &context, question))
                .await?
        };

        tracing::info!(
            confidence_score,
            sources = sources.len(),
            language = language.as_str(),
            "RAG pipeline completed"
        );

        Ok(RagAnswer {
            answer,
            sources,
            confidence_score,
        })
    }

    /// Vector store reachability, used by readiness checks.
    pub async fn retriever_ready(&self) -> Result<()> {
        self.retriever.heartbeat().await
    }
}
