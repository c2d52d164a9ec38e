//! RAG Governance - Backend Library
//!
//! Retrieval-augmented answers with policy screening, a persistent audit
//! trail and human-in-the-loop review.

#[macro_use]
mod macros;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
