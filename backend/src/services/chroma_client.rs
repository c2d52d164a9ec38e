//! Chroma vector store client (REST API v1).
//!
//! Queries are embedded locally through an [`Embedder`] and sent as
//! `query_embeddings`; Chroma returns the nearest documents with distances.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::services::rag_service::{Embedder, Retriever, ScoredDocument};

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: &'a [&'a str],
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Value>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Serialize)]
struct AddRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<serde_json::Value>,
}

/// A document to be stored in the collection.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Flatten the first (and only) query's results into scored documents.
fn into_scored_documents(response: QueryResponse) -> Vec<ScoredDocument> {
    let documents = response
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();
    let distances = response
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();

    documents
        .into_iter()
        .enumerate()
        .filter_map(|(i, content)| {
            let content = content?;
            let distance = distances.get(i).copied().flatten()?;
            let metadata = metadatas
                .get(i)
                .cloned()
                .flatten()
                .unwrap_or_else(|| json!({}));
            Some(ScoredDocument {
                content,
                metadata,
                distance,
            })
        })
        .collect()
}

pub struct ChromaRetriever {
    client: Client,
    base_url: String,
    collection_id: String,
    embedder: Arc<dyn Embedder>,
}

impl ChromaRetriever {
    /// Resolve the collection by name, creating it when missing.
    pub async fn connect(
        base_url: &str,
        collection_name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{}/api/v1/collections", base_url))
            .json(&json!({ "name": collection_name, "get_or_create": true }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chroma request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Chroma collection lookup failed: {} - {}",
                status, body
            )));
        }

        let collection: CollectionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Chroma collection: {}", e)))?;

        tracing::info!(
            collection = %collection.name,
            collection_id = %collection.id,
            "Vector store initialized"
        );

        Ok(Self {
            client,
            base_url,
            collection_id: collection.id,
            embedder,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.base_url, self.collection_id, suffix
        )
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Upstream(format!(
            "Chroma {} failed: {} - {}",
            what, status, body
        )))
    }

    /// Number of documents in the collection.
    pub async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .get(self.collection_url("count"))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chroma request failed: {}", e)))?;

        Self::check(response, "count")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Chroma count: {}", e)))
    }

    /// Embed and store documents.
    pub async fn add_documents(&self, documents: &[NewDocument]) -> Result<()> {
        let mut embeddings = Vec::with_capacity(documents.len());
        for doc in documents {
            embeddings.push(self.embedder.embed(&doc.content).await?);
        }

        let request = AddRequest {
            ids: documents.iter().map(|_| Uuid::new_v4().to_string()).collect(),
            embeddings,
            documents: documents.iter().map(|d| d.content.clone()).collect(),
            metadatas: documents.iter().map(|d| d.metadata.clone()).collect(),
        };

        let response = self
            .client
            .post(self.collection_url("add"))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chroma request failed: {}", e)))?;
        Self::check(response, "add").await?;
        Ok(())
    }

    /// Add the sample corpus when the collection is empty. Returns the number added.
    pub async fn seed_sample_documents(&self) -> Result<usize> {
        if self.count().await? > 0 {
            return Ok(0);
        }
        let samples = sample_documents();
        self.add_documents(&samples).await?;
        tracing::info!(count = samples.len(), "Added sample documents to vector store");
        Ok(samples.len())
    }
}

#[async_trait]
impl Retriever for ChromaRetriever {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let embedding = self.embedder.embed(query).await?;
        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: k,
            include: &["documents", "metadatas", "distances"],
        };

        let response = self
            .client
            .post(self.collection_url("query"))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chroma request failed: {}", e)))?;

        let parsed: QueryResponse = Self::check(response, "query")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Chroma query: {}", e)))?;

        Ok(into_scored_documents(parsed))
    }

    async fn heartbeat(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/v1/heartbeat", self.base_url))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chroma heartbeat failed: {}", e)))?;
        Self::check(response, "heartbeat").await?;
        Ok(())
    }
}

/// Built-in knowledge base used for local setups and demos.
pub fn sample_documents() -> Vec<NewDocument> {
    let docs = [
        (
            "Machine learning is a subset of artificial intelligence that enables systems to learn and improve from experience without being explicitly programmed.",
            json!({"source": "ml_basics.pdf", "page": 1, "topic": "machine_learning"}),
        ),
        (
            "Deep learning uses neural networks with multiple layers to progressively extract higher-level features from raw input data.",
            json!({"source": "ml_basics.pdf", "page": 2, "topic": "deep_learning"}),
        ),
        (
            "Natural Language Processing (NLP) is a branch of AI that helps computers understand, interpret and manipulate human language.",
            json!({"source": "nlp_guide.pdf", "page": 1, "topic": "nlp"}),
        ),
        (
            "Retrieval-Augmented Generation (RAG) combines retrieval of relevant documents with generative AI to produce more accurate and grounded responses.",
            json!({"source": "rag_overview.pdf", "page": 1, "topic": "rag"}),
        ),
        (
            "Responsible AI focuses on developing AI systems that are fair, transparent, accountable, and respect privacy and human rights.",
            json!({"source": "responsible_ai.pdf", "page": 1, "topic": "responsible_ai"}),
        ),
    ];

    docs.into_iter()
        .map(|(content, metadata)| NewDocument {
            content: content.to_string(),
            metadata,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_response_flattening() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b"]],
            "documents": [["first", "second"]],
            "metadatas": [[{"source": "x.pdf"}, null]],
            "distances": [[0.25, 1.5]],
            "embeddings": null
        }))
        .unwrap();

        let docs = into_scored_documents(response);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "first");
        assert_eq!(docs[0].metadata["source"], "x.pdf");
        assert_eq!(docs[0].distance, 0.25);
        assert_eq!(docs[1].metadata, json!({}));
    }

    #[test]
    fn test_query_response_skips_incomplete_entries() {
        let response: QueryResponse = serde_json::from_value(json!({
            "documents": [[null, "kept"]],
            "distances": [[0.1, 0.2]]
        }))
        .unwrap();
        let docs = into_scored_documents(response);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "kept");
        assert_eq!(docs[0].distance, 0.2);
    }

    #[test]
    fn test_empty_query_response() {
        let response: QueryResponse =
            serde_json::from_value(json!({"documents": [[]], "distances": [[]]})).unwrap();
        assert!(into_scored_documents(response).is_empty());
        assert!(into_scored_documents(QueryResponse::default()).is_empty());
    }

    #[test]
    fn test_query_request_shape() {
        let request = QueryRequest {
            query_embeddings: vec![vec![0.5, 0.25]],
            n_results: 3,
            include: &["documents", "metadatas", "distances"],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["n_results"], 3);
        assert_eq!(value["include"][2], "distances");
        assert_eq!(value["query_embeddings"][0][1], 0.25);
    }

    #[test]
    fn test_sample_documents() {
        let docs = sample_documents();
        assert_eq!(docs.len(), 5);
        assert!(docs.iter().all(|d| d.metadata.get("source").is_some()));
        assert!(docs[3].content.starts_with("Retrieval-Augmented Generation"));
    }
}
