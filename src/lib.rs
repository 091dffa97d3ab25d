#![deny(missing_docs)]

//! Core library for the docrag summary-indexed question answering service.

/// Answer generation from retrieved context.
pub mod answerer;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text-generation clients and prompt templates.
pub mod generation;
/// PDF upload parsing into page documents.
pub mod loader;
/// Structured logging and tracing setup.
pub mod logging;
/// Request and ingestion counters.
pub mod metrics;
/// Qdrant vector index integration.
pub mod qdrant;
/// Summary-to-document resolution for incoming questions.
pub mod retriever;
/// Orchestration of the upload and answer pipelines.
pub mod service;
/// Two-tier index: summary vectors plus full documents.
pub mod store;
/// Bounded-concurrency document summarization.
pub mod summarizer;
/// Vertex AI endpoint and credential plumbing.
pub mod vertex;
