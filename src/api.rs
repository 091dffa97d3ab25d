//! HTTP surface for docrag.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `GET /` – Liveness greeting.
//! - `POST /files` – Echo the names of the uploaded files, in upload order.
//! - `POST /upload` – Parse uploaded PDFs into pages, summarize every page, and index the
//!   summaries alongside the original pages. Returns a confirmation string.
//! - `POST /answer` – Retrieve the page whose summary best matches the question and answer
//!   from it.
//! - `GET /metrics` – Observe upload and answer counters.
//!
//! Multipart endpoints read every part named `files` (or `files[]`); other parts are ignored.

use crate::loader::UploadedFile;
use crate::service::{RagApi, ServiceError};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

const WELCOME_MESSAGE: &str = "Welcome to the docrag service!";

/// Build the HTTP router; multipart bodies larger than `max_upload_bytes` are rejected.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: RagApi + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/files", post(list_files))
        .route("/upload", post(upload_files::<S>))
        .route("/answer", post(answer_question::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(service)
}

/// Response body for `GET /`.
#[derive(Serialize)]
struct WelcomeResponse {
    message: &'static str,
}

async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE,
    })
}

/// Response body for `POST /files`.
#[derive(Serialize)]
struct FilenamesResponse {
    filenames: Vec<String>,
}

/// Return the client-supplied names of every uploaded file without reading their contents.
async fn list_files(mut multipart: Multipart) -> Result<Json<FilenamesResponse>, AppError> {
    let mut filenames = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if is_file_field(&field) {
            filenames.push(field.file_name().unwrap_or_default().to_string());
        }
    }
    Ok(Json(FilenamesResponse { filenames }))
}

/// Load, summarize, and index the uploaded files.
async fn upload_files<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<String>, AppError>
where
    S: RagApi,
{
    let files = read_uploads(multipart).await?;
    let count = files.len();
    let confirmation = service.upload(files).await?;
    tracing::info!(files = count, "Upload request completed");
    Ok(Json(confirmation))
}

/// Request body for `POST /answer`.
#[derive(Deserialize)]
struct AnswerRequest {
    /// Natural-language question.
    question: String,
}

/// Response body for `POST /answer`.
#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

async fn answer_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError>
where
    S: RagApi,
{
    let answer = service.answer(request.question).await?;
    Ok(Json(AnswerResponse { answer }))
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    files_uploaded: u64,
    documents_stored: u64,
    questions_answered: u64,
    empty_retrievals: u64,
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: RagApi,
{
    let snapshot = service.metrics_snapshot();
    Json(MetricsResponse {
        files_uploaded: snapshot.files_uploaded,
        documents_stored: snapshot.documents_stored,
        questions_answered: snapshot.questions_answered,
        empty_retrievals: snapshot.empty_retrievals,
    })
}

fn is_file_field(field: &Field<'_>) -> bool {
    matches!(field.name(), Some("files" | "files[]"))
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<UploadedFile>, MultipartError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if !is_file_field(&field) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        tracing::debug!(filename = %filename, bytes = bytes.len(), "Received upload");
        files.push(UploadedFile::new(filename, bytes));
    }
    Ok(files)
}

enum AppError {
    Multipart(MultipartError),
    Service(ServiceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Multipart(error) => error.into_response(),
            Self::Service(error) => {
                tracing::error!(error = %error, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::Multipart(inner)
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self::Service(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::loader::{LoaderError, UploadedFile};
    use crate::metrics::MetricsSnapshot;
    use crate::service::{RagApi, ServiceError};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docrag-test-boundary";

    #[derive(Default)]
    struct StubRagService {
        uploads: Mutex<Vec<Vec<UploadedFile>>>,
        questions: Mutex<Vec<String>>,
        fail_uploads: bool,
    }

    #[async_trait]
    impl RagApi for StubRagService {
        async fn upload(&self, files: Vec<UploadedFile>) -> Result<String, ServiceError> {
            if self.fail_uploads {
                return Err(LoaderError::Parse {
                    filename: "broken.pdf".into(),
                    message: "not a pdf".into(),
                }
                .into());
            }
            self.uploads.lock().await.push(files);
            Ok("Documents stored successfully".into())
        }

        async fn answer(&self, question: String) -> Result<String, ServiceError> {
            self.questions.lock().await.push(question.clone());
            Ok(format!("echo: {question}"))
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                files_uploaded: 3,
                documents_stored: 7,
                questions_answered: 2,
                empty_retrievals: 1,
            }
        }
    }

    fn app(service: Arc<StubRagService>) -> Router {
        create_router(service, 1024 * 1024)
    }

    fn multipart_body(parts: &[(&str, &str, &str)]) -> Body {
        let mut body = String::new();
        for (field, filename, content) in parts {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    fn multipart_request(uri: &str, parts: &[(&str, &str, &str)]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(parts))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn root_returns_welcome_message() {
        let response = app(Arc::default())
            .oneshot(Request::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "Welcome to the docrag service!" })
        );
    }

    #[tokio::test]
    async fn files_route_echoes_names_in_order() {
        let response = app(Arc::default())
            .oneshot(multipart_request(
                "/files",
                &[
                    ("files", "b.pdf", "two"),
                    ("files[]", "a.pdf", "one"),
                    ("notes", "ignored.txt", "skip"),
                    ("files", "c.pdf", "three"),
                ],
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "filenames": ["b.pdf", "a.pdf", "c.pdf"] })
        );
    }

    #[tokio::test]
    async fn upload_route_forwards_files_and_returns_confirmation() {
        let service = Arc::new(StubRagService::default());
        let response = app(service.clone())
            .oneshot(multipart_request(
                "/upload",
                &[("files", "sky.pdf", "The sky is blue.")],
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!("Documents stored successfully"));

        let uploads = service.uploads.lock().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].len(), 1);
        assert_eq!(uploads[0][0].filename, "sky.pdf");
        assert_eq!(&uploads[0][0].bytes[..], b"The sky is blue.");
    }

    #[tokio::test]
    async fn upload_failures_map_to_server_error() {
        let service = Arc::new(StubRagService {
            fail_uploads: true,
            ..StubRagService::default()
        });
        let response = app(service)
            .oneshot(multipart_request("/upload", &[("files", "broken.pdf", "x")]))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        assert!(String::from_utf8_lossy(&body).contains("broken.pdf"));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let service = Arc::new(StubRagService::default());
        let payload = "x".repeat(4 * 1024);
        let response = create_router(service.clone(), 1024)
            .oneshot(multipart_request(
                "/upload",
                &[("files", "large.pdf", payload.as_str())],
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn answer_route_wraps_model_output() {
        let service = Arc::new(StubRagService::default());
        let response = app(service.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/answer")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "question": "What color is the sky?" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "answer": "echo: What color is the sky?" })
        );
        assert_eq!(
            *service.questions.lock().await,
            vec!["What color is the sky?".to_string()]
        );
    }

    #[tokio::test]
    async fn metrics_route_reports_snapshot() {
        let response = app(Arc::default())
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("router response");

        let json = json_body(response).await;
        assert_eq!(json["files_uploaded"], 3);
        assert_eq!(json["documents_stored"], 7);
        assert_eq!(json["empty_retrievals"], 1);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let response = app(Arc::default())
            .oneshot(
                Request::get("/")
                    .header("origin", "https://elsewhere.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|value| value.to_str().ok()),
            Some("*")
        );
    }
}
