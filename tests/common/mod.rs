#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use octomerge::inference::{GeneratedImage, InferenceResult, JobHandle, ResultPayload};
use octomerge::presets::Payload;
use octomerge::{codec, router, AppState, Catalog, InferenceClient, InferenceError, Merger};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const BOUNDARY: &str = "octomerge-test-boundary";

pub const CATALOG: &str = r#"{
    "Mosaic": { "payload": { "num_images": 2, "prompt": "mosaic" } },
    "Anime": { "payload": { "num_images": 1, "prompt": "anime" } },
    "Dissolve": { "payload": { "num_images": 4, "prompt": "dissolve" } },
    "Watercolor": { "payload": { "num_images": 3, "prompt": "watercolor" } }
}"#;

/// Inference client that becomes ready after a fixed number of polls.
pub struct ScriptedClient {
    pub ready_after: usize,
    pub polls: AtomicUsize,
    pub result: ResultPayload,
    pub fail_on_poll: Option<InferenceError>,
    pub submitted: Mutex<Vec<Payload>>,
}

impl ScriptedClient {
    pub fn ready_after(polls: usize, result: ResultPayload) -> Self {
        Self {
            ready_after: polls,
            polls: AtomicUsize::new(0),
            result,
            fail_on_poll: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: InferenceError) -> Self {
        Self {
            fail_on_poll: Some(err),
            ..Self::ready_after(usize::MAX, ResultPayload::default())
        }
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn submit_async(&self, _endpoint: &str, payload: &Payload) -> InferenceResult<JobHandle> {
        self.submitted.lock().unwrap().push(payload.clone());
        Ok(JobHandle {
            response_id: "job-42".into(),
            poll_url: "mem://poll/job-42".into(),
        })
    }

    async fn is_ready(&self, _handle: &JobHandle) -> InferenceResult<bool> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = &self.fail_on_poll {
            return Err(err.clone());
        }
        Ok(n >= self.ready_after)
    }

    async fn fetch_result(&self, _handle: &JobHandle) -> InferenceResult<ResultPayload> {
        Ok(self.result.clone())
    }
}

pub fn png(shade: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 6, Rgb([shade, 255 - shade, 0])));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

pub fn result_of(shades: &[u8]) -> ResultPayload {
    ResultPayload {
        images: shades
            .iter()
            .map(|s| GeneratedImage {
                image_b64: codec::reencode(&png(*s)).unwrap(),
            })
            .collect(),
    }
}

/// Red channel of the top-left pixel of a `data:image/png;base64,` URL.
pub fn shade_of(data_url: &str) -> u8 {
    let b64 = data_url.strip_prefix("data:image/png;base64,").unwrap();
    codec::decode(b64).unwrap().to_rgb8().get_pixel(0, 0)[0]
}

pub fn state_with(client: Arc<ScriptedClient>) -> AppState {
    let catalog = Catalog::from_json(CATALOG).unwrap();
    let merger = Merger::new(client, "mem://merge/generate/sdxl", Duration::from_millis(250));
    AppState::new(catalog, merger)
}

pub fn app_with(client: Arc<ScriptedClient>, assets: &Path) -> Router {
    router(state_with(client), assets)
}

pub fn multipart_body(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

pub fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn put_files(uri: &str, files: &[(&str, Vec<u8>)]) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

pub async fn new_session(app: &Router) -> String {
    let (status, snapshot) = send(app, post("/api/sessions")).await;
    assert_eq!(status, StatusCode::CREATED);
    snapshot["id"].as_str().unwrap().to_string()
}

/// Polls the merge status until the run leaves its active phases.
pub async fn wait_for_merge(app: &Router, id: &str) -> Value {
    loop {
        let (_, status) = send(app, get(&format!("/api/sessions/{id}/merge"))).await;
        match status["phase"].as_str().unwrap() {
            "encoding" | "submitted" | "polling" | "ready" => {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            _ => return status,
        }
    }
}
