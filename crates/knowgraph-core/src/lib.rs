//! Knowgraph core library: a code knowledge graph for C# repositories.
//!
//! This crate provides the C# indexer with dependency-injection aware call
//! resolution, the SQLite-backed graph and history store, graph queries
//! (impact analysis, dependency chains and cycle detection), and the
//! decay-weighted analytics built on recorded developer activity. The
//! [`KnowledgeEngine`] ties them together behind one handle for a tool
//! dispatch layer.

pub mod analytics;
pub mod config;
pub mod engine;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod query;
pub mod store;

pub use config::EngineConfig;
pub use engine::KnowledgeEngine;
pub use errors::{KnowgraphError, KnowgraphResult};
pub use store::{CancelToken, Database};
