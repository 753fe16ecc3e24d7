//! Remote inference: the async submit / poll / fetch contract.

pub mod octoai;

use crate::presets::Payload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use octoai::OctoAiClient;

/// Failure taxonomy surfaced to the orchestrator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    /// Malformed request, auth failure or local misuse.
    #[error("client error: {0}")]
    Client(String),

    /// The remote service failed to process the request.
    #[error("server error: {0}")]
    Server(String),

    /// Anything else, including transport failures.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl InferenceError {
    /// Short name of the branch, used as a log field.
    pub fn branch(&self) -> &'static str {
        match self {
            InferenceError::Client(_) => "client",
            InferenceError::Server(_) => "server",
            InferenceError::Unexpected(_) => "unexpected",
        }
    }
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// Reference to an in-flight async inference request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub response_id: String,
    pub poll_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub image_b64: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub images: Vec<GeneratedImage>,
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submits a request without waiting for it to finish.
    async fn submit_async(&self, endpoint: &str, payload: &Payload) -> InferenceResult<JobHandle>;

    async fn is_ready(&self, handle: &JobHandle) -> InferenceResult<bool>;

    /// Only meaningful once `is_ready` has returned true.
    async fn fetch_result(&self, handle: &JobHandle) -> InferenceResult<ResultPayload>;
}
