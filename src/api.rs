//! HTTP surface for ragserve.
//!
//! This module exposes a compact Axum router mirroring the service's public
//! contract:
//!
//! - `GET /` – Static HTML console for uploading documents and asking questions.
//! - `POST /upload` – Multipart form field `file` (`.pdf` or `.txt`); chunks,
//!   embeds, and stores the document, returning `{chunks_stored, skipped_duplicates, filename}`.
//! - `POST /query` – JSON `{"question": ...}`; responds with a chunked
//!   `text/plain` body streaming the generated answer token by token.
//! - `DELETE /clear` – Remove every stored chunk.
//! - `GET /health` – Liveness check with no provider dependencies.
//! - `GET /metrics` – Ingestion and query counters.
//!
//! Client faults (unsupported file type, missing multipart field, blank
//! question) map to 400; provider failures map to 500. Errors always carry a
//! JSON body with a single `error` field.

use crate::processing::{RagApi, RagError};
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Largest accepted upload, in bytes.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the HTTP router exposing the document-QA surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_document::<S>))
        .route("/query", post(query_documents::<S>))
        .route("/clear", delete(clear_documents::<S>))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Serve the static landing page.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Success response for the `POST /upload` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    /// Number of chunks stored for the uploaded document.
    chunks_stored: usize,
    /// Chunks skipped within this upload due to duplicate content.
    skipped_duplicates: usize,
    /// Original filename, echoed back for the console.
    filename: String,
}

/// Ingest an uploaded document.
///
/// Accepts a multipart form with a single `file` field; the filename
/// extension selects the loader.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::invalid(format!("malformed multipart body: {err}")))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| AppError::invalid("field 'file' is missing a filename"))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::invalid(format!("failed to read upload: {err}")))?;
            file = Some((filename, bytes));
            break;
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::invalid("multipart field 'file' is required"))?;
    let outcome = service.ingest_document(&filename, &bytes).await?;
    tracing::info!(
        filename,
        chunks = outcome.chunks_stored,
        skipped_duplicates = outcome.skipped_duplicates,
        "Upload completed"
    );
    Ok(Json(UploadResponse {
        chunks_stored: outcome.chunks_stored,
        skipped_duplicates: outcome.skipped_duplicates,
        filename,
    }))
}

/// Request body for the `POST /query` endpoint.
#[derive(Deserialize)]
struct QueryRequest {
    /// Natural-language question to answer from the stored documents.
    question: String,
}

/// Answer a question with a streamed plain-text response.
///
/// The body is parsed by hand rather than through the `Json` extractor so a
/// malformed or incomplete body goes through [`AppError`] like every other
/// client fault: 400 with a JSON error body, not an extractor rejection.
///
/// Tokens are forwarded as they arrive from the provider; nothing is
/// buffered, so perceived latency matches the provider's. Dropping the
/// connection drops the stream and aborts the in-flight generation.
async fn query_documents<S>(
    State(service): State<Arc<S>>,
    body: Bytes,
) -> Result<Response, AppError>
where
    S: RagApi,
{
    let request: QueryRequest = serde_json::from_slice(&body)
        .map_err(|err| AppError::invalid(format!("malformed JSON body: {err}")))?;
    let stream = service.answer_stream(request.question).await?;
    let body = Body::from_stream(stream.map_ok(Bytes::from));
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Delete all stored chunks. Idempotent; clearing an empty store succeeds.
async fn clear_documents<S>(State(service): State<Arc<S>>) -> Result<Response, AppError>
where
    S: RagApi,
{
    service.clear_documents().await?;
    Ok(Json(json!({
        "success": true,
        "message": "All documents cleared",
    }))
    .into_response())
}

/// Liveness check; intentionally touches no external provider.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Return a concise metrics snapshot with ingestion and query counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(RagError);

impl AppError {
    fn invalid(message: impl Into<String>) -> Self {
        Self(RagError::InvalidRequest(message.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(inner: RagError) -> Self {
        Self(inner)
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>ragserve</title>
<style>
  body { font-family: sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }
  section { margin-bottom: 2rem; }
  textarea { width: 100%; height: 4rem; }
  pre { background: #f4f4f4; padding: 1rem; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>ragserve</h1>
<section>
  <h2>Upload a document</h2>
  <input type="file" id="file" accept=".pdf,.txt">
  <button id="upload">Upload</button>
  <pre id="upload-result"></pre>
</section>
<section>
  <h2>Ask a question</h2>
  <textarea id="question" placeholder="What would you like to know?"></textarea>
  <button id="ask">Ask</button>
  <pre id="answer"></pre>
</section>
<script>
document.getElementById('upload').addEventListener('click', async () => {
  const input = document.getElementById('file');
  if (!input.files.length) return;
  const form = new FormData();
  form.append('file', input.files[0]);
  const response = await fetch('/upload', { method: 'POST', body: form });
  document.getElementById('upload-result').textContent = await response.text();
});
document.getElementById('ask').addEventListener('click', async () => {
  const question = document.getElementById('question').value;
  const target = document.getElementById('answer');
  target.textContent = '';
  const response = await fetch('/query', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ question }),
  });
  if (!response.ok) { target.textContent = await response.text(); return; }
  const reader = response.body.getReader();
  const decoder = new TextDecoder();
  for (;;) {
    const { done, value } = await reader.read();
    if (done) break;
    target.textContent += decoder.decode(value, { stream: true });
  }
});
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::TokenStream;
    use crate::loader::LoaderError;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::IngestOutcome;
    use async_trait::async_trait;
    use axum::{
        body::to_bytes,
        http::{Method, Request, StatusCode},
    };
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Copy)]
    enum StubMode {
        Ok,
        UnsupportedFile,
        ProviderDown,
    }

    struct StubRagService {
        mode: StubMode,
        ingests: Mutex<Vec<String>>,
        clears: Mutex<usize>,
    }

    impl StubRagService {
        fn new(mode: StubMode) -> Self {
            Self {
                mode,
                ingests: Mutex::new(Vec::new()),
                clears: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl RagApi for StubRagService {
        async fn ingest_document(
            &self,
            filename: &str,
            _bytes: &[u8],
        ) -> Result<IngestOutcome, RagError> {
            match self.mode {
                StubMode::Ok => {
                    self.ingests.lock().expect("lock").push(filename.to_string());
                    Ok(IngestOutcome {
                        chunks_stored: 2,
                        skipped_duplicates: 1,
                    })
                }
                StubMode::UnsupportedFile => Err(RagError::Loader(LoaderError::UnsupportedType {
                    extension: "docx".into(),
                })),
                StubMode::ProviderDown => Err(RagError::EmptyEmbedding),
            }
        }

        async fn answer_stream(&self, _question: String) -> Result<TokenStream, RagError> {
            match self.mode {
                StubMode::Ok => Ok(Box::pin(futures_util::stream::iter(
                    ["The sky ", "is blue."].map(|token| Ok(token.to_string())),
                ))),
                StubMode::UnsupportedFile | StubMode::ProviderDown => {
                    Err(RagError::EmptyEmbedding)
                }
            }
        }

        async fn clear_documents(&self) -> Result<(), RagError> {
            *self.clears.lock().expect("lock") += 1;
            Ok(())
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 1,
                chunks_stored: 2,
                queries_answered: 3,
            }
        }
    }

    fn multipart_upload(filename: &str, content: &str) -> Request<Body> {
        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn upload_route_stores_document_and_reports_counts() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service.clone());

        let response = app
            .oneshot(multipart_upload("notes.txt", "The sky is blue."))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["chunks_stored"], 2);
        assert_eq!(json["skipped_duplicates"], 1);
        assert_eq!(json["filename"], "notes.txt");

        let ingests = service.ingests.lock().expect("lock");
        assert_eq!(ingests.as_slice(), ["notes.txt"]);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_a_client_error() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service.clone());

        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"other\"\r\n\r\n\
             value\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request");

        let response = app.oneshot(request).await.expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(service.ingests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn unsupported_file_type_maps_to_bad_request() {
        let service = Arc::new(StubRagService::new(StubMode::UnsupportedFile));
        let app = create_router(service);

        let response = app
            .oneshot(multipart_upload("report.docx", "irrelevant"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert!(json["error"].as_str().expect("error").contains("docx"));
    }

    #[tokio::test]
    async fn provider_failure_maps_to_server_error() {
        let service = Arc::new(StubRagService::new(StubMode::ProviderDown));
        let app = create_router(service);

        let response = app
            .oneshot(multipart_upload("notes.txt", "The sky is blue."))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn query_route_streams_plain_text_answer() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question": "What color is the sky?"}"#))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/plain; charset=utf-8")
        );
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        assert_eq!(&body[..], b"The sky is blue.");
    }

    #[tokio::test]
    async fn malformed_query_json_is_a_client_error() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert!(
            json["error"]
                .as_str()
                .expect("error")
                .contains("malformed JSON body")
        );
    }

    #[tokio::test]
    async fn query_body_without_question_is_a_client_error() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt": "wrong field"}"#))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn clear_route_reports_success() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/clear")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*service.clears.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn health_route_needs_no_providers() {
        let service = Arc::new(StubRagService::new(StubMode::ProviderDown));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn metrics_route_exposes_counters() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["documents_ingested"], 1);
        assert_eq!(json["chunks_stored"], 2);
        assert_eq!(json["queries_answered"], 3);
    }

    #[tokio::test]
    async fn index_serves_html_console() {
        let service = Arc::new(StubRagService::new(StubMode::Ok));
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let html = String::from_utf8(body.to_vec()).expect("utf8 body");
        assert!(html.contains("<title>ragserve</title>"));
    }
}
