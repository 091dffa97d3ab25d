//! Qdrant vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use types::{PointInsert, QdrantError, ScoredPoint};
