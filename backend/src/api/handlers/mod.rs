//! HTTP request handlers.

pub mod analytics;
pub mod audit;
pub mod health;
pub mod prompt;
pub mod review;
