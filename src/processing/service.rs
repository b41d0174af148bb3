//! Pipeline service coordinating loading, chunking, embedding, retrieval, and
//! generation.

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, OpenAiEmbeddingClient},
    generation::{ChatClient, OpenAiChatClient, TokenStream, compose_prompt},
    loader,
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{
        chunking::chunk_text,
        mappers::{build_row_metadata, current_timestamp_rfc3339, dedupe_chunks, generate_upload_id},
        types::{IngestOutcome, RagError},
    },
    supabase::{DocumentRow, RetrievedChunk, SupabaseService, VectorStore},
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;

/// Coordinates the full document-QA pipeline.
///
/// The service owns long-lived handles to the embedding client, the vector
/// store gateway, the chat client, and the metrics registry. Construct it
/// once near process start and share it through an `Arc`; the HTTP surface
/// only sees the [`RagApi`] trait.
pub struct RagService {
    embedding_client: Box<dyn EmbeddingClient>,
    store: Box<dyn VectorStore>,
    chat_client: Box<dyn ChatClient>,
    metrics: Arc<ServiceMetrics>,
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Load, chunk, embed, and store an uploaded document.
    async fn ingest_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, RagError>;

    /// Answer a question with retrieval-augmented generation, streaming
    /// tokens as they arrive from the provider.
    async fn answer_stream(&self, question: String) -> Result<TokenStream, RagError>;

    /// Delete every stored chunk.
    async fn clear_documents(&self) -> Result<(), RagError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl RagService {
    /// Build a new service wired to the real providers.
    pub fn new() -> Self {
        tracing::info!("Initializing provider clients");
        let embedding_client =
            OpenAiEmbeddingClient::new().expect("Failed to initialize embedding client");
        let store = SupabaseService::new().expect("Failed to initialize Supabase client");
        let chat_client = OpenAiChatClient::new().expect("Failed to initialize chat client");
        tracing::info!("Provider clients initialized");

        Self::from_parts(
            Box::new(embedding_client),
            Box::new(store),
            Box::new(chat_client),
        )
    }

    /// Assemble a service from explicit components.
    ///
    /// This is the substitution seam: tests wire in in-memory fakes here.
    pub fn from_parts(
        embedding_client: Box<dyn EmbeddingClient>,
        store: Box<dyn VectorStore>,
        chat_client: Box<dyn ChatClient>,
    ) -> Self {
        Self {
            embedding_client,
            store,
            chat_client,
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    /// Load, chunk, embed, and store an uploaded document.
    ///
    /// Insertion is a single batched store request; on failure nothing is
    /// rolled back and the error is reported to the caller.
    pub async fn ingest_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, RagError> {
        tracing::info!(filename, size = bytes.len(), "Processing document");
        let config = get_config();

        let text = loader::extract_text(filename, bytes)?;
        let chunks = chunk_text(&text, config.chunk_size, config.chunk_overlap)?;
        let (prepared, skipped_duplicates) = dedupe_chunks(chunks);

        let texts: Vec<String> = prepared.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self.embedding_client.embed(texts).await?;
        debug_assert_eq!(prepared.len(), embeddings.len());
        for vector in &embeddings {
            ensure_dimension(config.embedding_dimension, vector)?;
        }

        let upload_id = generate_upload_id();
        let ingested_at = current_timestamp_rfc3339();
        let rows: Vec<DocumentRow> = prepared
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let metadata = build_row_metadata(filename, &upload_id, &ingested_at, &chunk);
                DocumentRow {
                    content: chunk.content,
                    metadata,
                    embedding,
                }
            })
            .collect();

        let chunks_stored = self.store.insert(rows).await?;
        self.metrics.record_document(chunks_stored as u64);
        tracing::info!(
            filename,
            upload_id,
            chunks = chunks_stored,
            skipped_duplicates,
            "Document ingested"
        );

        Ok(IngestOutcome {
            chunks_stored,
            skipped_duplicates,
        })
    }

    /// Answer a question: embed, retrieve, compose the prompt, and stream the
    /// generated tokens followed by a sources trailer.
    pub async fn answer_stream(&self, question: String) -> Result<TokenStream, RagError> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(RagError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }
        let config = get_config();

        let mut vectors = self.embedding_client.embed(vec![question.clone()]).await?;
        let vector = vectors.pop().ok_or(RagError::EmptyEmbedding)?;
        ensure_dimension(config.embedding_dimension, &vector)?;

        let hits = self
            .store
            .search(vector, config.match_threshold, config.match_count)
            .await?;
        tracing::debug!(
            hits = hits.len(),
            top_similarity = hits.first().map(|hit| hit.similarity),
            "Retrieved context"
        );

        let contexts: Vec<String> = hits.iter().map(|hit| hit.content.clone()).collect();
        let prompt = compose_prompt(&contexts, &question);
        let mut inner = self.chat_client.stream_completion(prompt).await?;
        let trailer = sources_trailer(&hits);

        self.metrics.record_query();

        let stream = try_stream! {
            while let Some(token) = inner.next().await {
                yield token?;
            }
            if let Some(trailer) = trailer {
                yield trailer;
            }
        };
        Ok(Box::pin(stream))
    }

    /// Delete every stored chunk unconditionally.
    pub async fn clear_documents(&self) -> Result<(), RagError> {
        self.store.clear().await?;
        Ok(())
    }

    /// Return the current activity metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, RagError> {
        RagService::ingest_document(self, filename, bytes).await
    }

    async fn answer_stream(&self, question: String) -> Result<TokenStream, RagError> {
        RagService::answer_stream(self, question).await
    }

    async fn clear_documents(&self) -> Result<(), RagError> {
        RagService::clear_documents(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}

fn ensure_dimension(expected: usize, vector: &[f32]) -> Result<(), RagError> {
    let actual = vector.len();
    if actual != expected {
        return Err(RagError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Plain-text trailer naming each retrieved source and its similarity.
///
/// `None` when retrieval came back empty, so a no-context answer is not
/// followed by an empty sources list.
fn sources_trailer(hits: &[RetrievedChunk]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    let mut trailer = String::from("\n\nSources:");
    for (position, hit) in hits.iter().enumerate() {
        let source = hit.source().unwrap_or("unknown");
        trailer.push_str(&format!(
            "\n{}. {} (similarity: {:.2})",
            position + 1,
            source,
            hit.similarity
        ));
    }
    Some(trailer)
}
