//! # Room Schema - Schema Resolution & Caching Engine
//!
//! Derives the persistence schema described by annotated declarations
//! (entities, embedded value objects, databases, DAOs) from a live,
//! incrementally reparsed code index.
//!
//! Room Schema provides:
//! - Revalidating element handles into an externally owned code model
//! - Dual-spelling annotation discovery (legacy and current packages)
//! - Constant-folded table and column names with identifier fallback
//! - Recursive flattening of embedded objects into prefixed columns
//! - A per-unit schema cache invalidated by structural-change versions

pub mod handle;
pub mod decl;
pub mod index;
pub mod annotations;
pub mod locator;
pub mod resolver;
pub mod schema;
pub mod cache;
pub mod manager;
pub mod config;

// Re-exports for convenient access
pub use handle::{DeclId, ElementHandle, ElementKind};
pub use index::{CodeIndex, InMemoryIndex, SearchScope, SourceUnit, StructuralVersion};
pub use annotations::{AnnotationSet, FrameworkAnnotation};
pub use schema::{Column, Dao, Database, Entity, Schema, SchemaStats};
pub use cache::CacheStats;
pub use manager::SchemaManager;
pub use config::EngineConfig;

/// Result type alias for Room Schema operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Room Schema operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Unknown annotation: {0}")]
    UnknownAnnotation(String),

    #[error("Build started at {started} invalidated by structural change to {current}")]
    Cancelled {
        started: StructuralVersion,
        current: StructuralVersion,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying against a fresh snapshot may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}
