//! HTTP client for OctoAI-style async inference endpoints.

use super::{InferenceClient, InferenceError, InferenceResult, JobHandle, ResultPayload};
use crate::presets::Payload;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const ASYNC_HEADER: &str = "X-OctoAI-Async";

#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    response_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl PollResponse {
    fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}

#[derive(Clone)]
pub struct OctoAiClient {
    http: reqwest::Client,
    token: String,
}

impl OctoAiClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> InferenceResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            InferenceError::Unexpected(format!("unreadable response ({e}): {}", preview(&body)))
        })
    }

    async fn poll(&self, handle: &JobHandle) -> InferenceResult<PollResponse> {
        let response = self
            .http
            .get(&handle.poll_url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        self.read_json(response).await
    }
}

#[async_trait]
impl InferenceClient for OctoAiClient {
    async fn submit_async(&self, endpoint: &str, payload: &Payload) -> InferenceResult<JobHandle> {
        tracing::debug!(endpoint, "📤 submitting async inference request");

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(&self.token)
            .header(ASYNC_HEADER, "1")
            .json(payload)
            .send()
            .await
            .map_err(transport)?;

        let handle: JobHandle = self.read_json(response).await?;
        tracing::info!(response_id = %handle.response_id, "inference job accepted");
        Ok(handle)
    }

    async fn is_ready(&self, handle: &JobHandle) -> InferenceResult<bool> {
        let poll = self.poll(handle).await?;
        tracing::trace!(response_id = %handle.response_id, status = %poll.status, "polled");
        Ok(poll.is_finished())
    }

    async fn fetch_result(&self, handle: &JobHandle) -> InferenceResult<ResultPayload> {
        let poll = self.poll(handle).await?;

        match poll.status.as_str() {
            "failed" => {
                return Err(InferenceError::Server(
                    poll.error.unwrap_or_else(|| "inference job failed".to_string()),
                ))
            }
            "completed" => {}
            other => {
                return Err(InferenceError::Client(format!(
                    "result requested before the job finished (status {other:?})"
                )))
            }
        }

        let url = poll.response_url.ok_or_else(|| {
            InferenceError::Unexpected("completed job has no response_url".to_string())
        })?;

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        self.read_json(response).await
    }
}

fn transport(err: reqwest::Error) -> InferenceError {
    InferenceError::Unexpected(format!("transport: {err}"))
}

/// Maps a non-success HTTP status onto the error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> InferenceError {
    let detail = format!("{status}: {}", preview(body));
    if status.is_client_error() {
        InferenceError::Client(detail)
    } else if status.is_server_error() {
        InferenceError::Server(detail)
    } else {
        InferenceError::Unexpected(detail)
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Clone)]
    struct Fake {
        base: String,
        polls: Arc<AtomicUsize>,
        fail: bool,
    }

    async fn submit(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer token-123") {
            return (AxumStatus::UNAUTHORIZED, Json(json!({"error": "bad token"})));
        }
        assert_eq!(headers.get(ASYNC_HEADER).unwrap(), "1");
        assert_eq!(body["num_images"], 2);
        (
            AxumStatus::CREATED,
            Json(json!({"response_id": "job-1", "poll_url": format!("{}/poll/job-1", fake.base)})),
        )
    }

    async fn poll(State(fake): State<Fake>) -> Json<Value> {
        let n = fake.polls.fetch_add(1, Ordering::SeqCst);
        if n < 1 {
            return Json(json!({"status": "pending"}));
        }
        if fake.fail {
            Json(json!({"status": "failed", "error": "GPU on fire"}))
        } else {
            Json(json!({"status": "completed", "response_url": format!("{}/result/job-1", fake.base)}))
        }
    }

    async fn result() -> Json<Value> {
        Json(json!({"images": [{"image_b64": "AAAA"}, {"image_b64": "BBBB"}], "seed": 7}))
    }

    async fn spawn_fake(fail: bool) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let fake = Fake {
            base: base.clone(),
            polls: Arc::new(AtomicUsize::new(0)),
            fail,
        };
        let app = Router::new()
            .route("/generate/sdxl", post(submit))
            .route("/poll/job-1", get(poll))
            .route("/result/job-1", get(result))
            .route("/broken", post(|| async { (AxumStatus::BAD_GATEWAY, "upstream down") }))
            .with_state(fake);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        base
    }

    fn payload() -> Payload {
        json!({"num_images": 2}).as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn submit_poll_fetch_round_trip() {
        let base = spawn_fake(false).await;
        let client = OctoAiClient::new("token-123");

        let handle = client.submit_async(&format!("{base}/generate/sdxl"), &payload()).await.unwrap();
        assert_eq!(handle.response_id, "job-1");
        assert!(!client.is_ready(&handle).await.unwrap());
        assert!(client.is_ready(&handle).await.unwrap());

        let result = client.fetch_result(&handle).await.unwrap();
        let images: Vec<_> = result.images.iter().map(|i| i.image_b64.as_str()).collect();
        assert_eq!(images, ["AAAA", "BBBB"]);
    }

    #[tokio::test]
    async fn failed_job_surfaces_as_server_error() {
        let base = spawn_fake(true).await;
        let client = OctoAiClient::new("token-123");

        let handle = client.submit_async(&format!("{base}/generate/sdxl"), &payload()).await.unwrap();
        while !client.is_ready(&handle).await.unwrap() {}

        let err = client.fetch_result(&handle).await.unwrap_err();
        assert_eq!(err, InferenceError::Server("GPU on fire".to_string()));
    }

    #[tokio::test]
    async fn bad_token_is_a_client_error() {
        let base = spawn_fake(false).await;
        let client = OctoAiClient::new("wrong");

        let err = client.submit_async(&format!("{base}/generate/sdxl"), &payload()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Client(_)));
    }

    #[tokio::test]
    async fn gateway_failure_is_a_server_error() {
        let base = spawn_fake(false).await;
        let client = OctoAiClient::new("token-123");

        let err = client.submit_async(&format!("{base}/broken"), &payload()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Server(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unexpected() {
        let client = OctoAiClient::new("token-123");
        let err = client.submit_async("http://127.0.0.1:9/generate/sdxl", &payload()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Unexpected(_)));
    }

    #[test]
    fn classify_status_covers_all_branches() {
        assert_eq!(classify_status(StatusCode::FORBIDDEN, "").branch(), "client");
        assert_eq!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").branch(), "server");
        assert_eq!(classify_status(StatusCode::MULTIPLE_CHOICES, "").branch(), "unexpected");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        assert_eq!(preview(&long).chars().count(), 500);
        assert_eq!(preview("short"), "short");
    }
}
