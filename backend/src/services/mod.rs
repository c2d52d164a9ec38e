//! Business logic services.

pub mod analytics_service;
pub mod audit_service;
pub mod chroma_client;
pub mod gemini_client;
pub mod metrics_service;
pub mod policy_service;
pub mod prompt_service;
pub mod rag_service;
