//! Supabase vector store integration.

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::SupabaseService;
pub use types::{DocumentRow, RetrievedChunk, StoreError};

/// Interface to the managed vector store.
///
/// The concrete implementation is a pass-through adapter over PostgREST;
/// the trait exists so pipeline tests can substitute an in-memory fake.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist chunk rows, returning how many were written.
    async fn insert(&self, rows: Vec<DocumentRow>) -> Result<usize, StoreError>;

    /// Return up to `limit` chunks whose similarity to `query_embedding`
    /// exceeds `threshold`, sorted by descending similarity.
    async fn search(
        &self,
        query_embedding: Vec<f32>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    /// Delete all stored chunks unconditionally.
    async fn clear(&self) -> Result<(), StoreError>;
}
