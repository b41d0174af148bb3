//! HTTP client wrapper for the Supabase PostgREST surface.

use crate::config::get_config;
use crate::supabase::VectorStore;
use crate::supabase::types::{DocumentRow, MatchedRow, RetrievedChunk, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::json;
use std::time::Duration;

/// Lightweight HTTP client for the managed vector store.
///
/// A pass-through adapter: ranking, filtering, and similarity math all happen
/// server-side in the `match_documents` SQL function. No caching, no retries.
pub struct SupabaseService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) service_key: String,
}

impl SupabaseService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, StoreError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("ragserve/0.1")
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()?;

        let base_url = normalize_base_url(&config.supabase_url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized Supabase HTTP client");

        Ok(Self {
            client,
            base_url,
            service_key: config.supabase_service_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), StoreError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Supabase request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for SupabaseService {
    /// Batch-insert chunk rows into the `documents` table.
    async fn insert(&self, rows: Vec<DocumentRow>) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let row_count = rows.len();

        let response = self
            .request(Method::POST, "rest/v1/documents")
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;

        self.ensure_success(response).await?;
        tracing::debug!(rows = row_count, "Rows inserted");
        Ok(row_count)
    }

    /// Run the server-side `match_documents` similarity search.
    ///
    /// Rows come back ranked by descending similarity and filtered by the
    /// exclusive threshold; this client does not re-rank.
    async fn search(
        &self,
        query_embedding: Vec<f32>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let response = self
            .request(Method::POST, "rest/v1/rpc/match_documents")
            .json(&json!({
                "query_embedding": query_embedding,
                "match_threshold": threshold,
                "match_count": limit,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Similarity search failed");
            return Err(error);
        }

        let rows: Vec<MatchedRow> = response.json().await?;
        Ok(rows.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Delete every stored chunk. Irreversible; succeeds on an empty table.
    async fn clear(&self) -> Result<(), StoreError> {
        // PostgREST refuses unfiltered deletes; `id=neq.0` matches every row
        // since ids start at 1.
        let response = self
            .request(Method::DELETE, "rest/v1/documents")
            .query(&[("id", "neq.0")])
            .send()
            .await?;

        self.ensure_success(response).await?;
        tracing::info!("Vector store cleared");
        Ok(())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
