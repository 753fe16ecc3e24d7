//! The submit / poll / render flow behind the OctoMerge button.
//!
//! A run moves through [`MergePhase`]s and publishes every change on a
//! `watch` channel so the page can render progress while the task polls
//! the inference service in the background.

use crate::codec;
use crate::inference::{InferenceClient, InferenceError, ResultPayload};
use crate::presets::{num_images, Payload};
use crate::session::{MergeRun, UploadedImage};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub const PROGRESS_CAP: u8 = 99;
pub const PROGRESS_LABEL: &str = "OctoMerge in action...";
pub const PROGRESS_LABEL_SLOW: &str = "OctoMerge is taking longer than usual, hang tight!";

/// Shown for every failure; the detail only goes to the logs.
pub const ADVISORY: &str = "Oops something went wrong! Please hit OctoMerge again or \
[report the issue if this is a recurring problem](https://forms.gle/vWVAXa8CU7wXPGcq6)! \
Join our discord [here](https://discord.com/invite/rXTPeRBcG7) and hop on to the #octoshop \
channel to provide feedback or ask questions.";

/// A cancellation token shared between a session and its merge task.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    Idle,
    Encoding,
    Submitted,
    Polling,
    Ready,
    Rendered,
    Errored,
}

impl MergePhase {
    /// Whether a run in this phase is still working.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            MergePhase::Encoding | MergePhase::Submitted | MergePhase::Polling | MergePhase::Ready
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub percent: u8,
    pub label: &'static str,
}

impl Progress {
    pub fn start() -> Self {
        Self {
            percent: 0,
            label: PROGRESS_LABEL,
        }
    }

    /// One poll step. Saturates below 100 so the bar never claims completion early.
    pub fn tick(&mut self) {
        self.percent = (self.percent + 1).min(PROGRESS_CAP);
        if self.percent == PROGRESS_CAP {
            self.label = PROGRESS_LABEL_SLOW;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeStatus {
    pub phase: MergePhase,
    pub progress: Option<Progress>,
    pub elapsed_secs: Option<f64>,
    pub summary: Option<String>,
    /// Exactly `num_images` slots once rendered.
    pub gallery: Vec<Option<RenderedImage>>,
    pub message: Option<String>,
}

impl MergeStatus {
    pub fn new(phase: MergePhase) -> Self {
        Self {
            phase,
            progress: None,
            elapsed_secs: None,
            summary: None,
            gallery: Vec::new(),
            message: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum MergeOutcome {
    /// No uploads; nothing was submitted.
    NothingToSubmit,
    Rendered { slots: usize },
    Failed(InferenceError),
    Cancelled,
}

enum Fault {
    Inference(InferenceError),
    Cancelled,
}

impl From<InferenceError> for Fault {
    fn from(err: InferenceError) -> Self {
        Fault::Inference(err)
    }
}

/// Adds the encoded uploads to a copy of the preset payload.
pub fn build_request(template: &Payload, encoded: Vec<String>) -> Payload {
    let mut request = template.clone();
    request.insert("transfer_images".to_string(), json!({ "trigger": encoded }));
    request
}

/// Re-encodes every upload for transport. One bad upload rejects the whole batch.
pub fn encode_uploads(images: &[UploadedImage]) -> Result<Vec<String>, InferenceError> {
    images
        .iter()
        .map(|img| {
            codec::reencode(&img.bytes)
                .map_err(|e| InferenceError::Unexpected(format!("input image {:?}: {e}", img.filename)))
        })
        .collect()
}

/// Validates the returned images, in service order, and places them into
/// `slots` gallery slots. The service's base64 is passed to the page as-is.
pub fn render_gallery(
    result: &ResultPayload,
    slots: usize,
) -> Result<Vec<Option<RenderedImage>>, InferenceError> {
    if result.images.is_empty() {
        return Err(InferenceError::Unexpected("result contained no images".to_string()));
    }
    if result.images.len() < slots {
        tracing::warn!(
            requested = slots,
            returned = result.images.len(),
            "service returned fewer images than requested, leaving slots empty"
        );
    }

    result
        .images
        .iter()
        .take(slots)
        .enumerate()
        .map(|(idx, generated)| -> Result<Option<RenderedImage>, InferenceError> {
            let inspected = codec::inspect(&generated.image_b64)
                .map_err(|e| InferenceError::Unexpected(format!("result image {idx}: {e}")))?;
            Ok(Some(RenderedImage {
                data_url: codec::data_url(inspected.mime, &generated.image_b64),
                width: inspected.width,
                height: inspected.height,
            }))
        })
        .chain(std::iter::repeat_with(|| Ok(None)))
        .take(slots)
        .collect()
}

/// Runs image work on the blocking pool so pixel crunching never stalls the runtime.
async fn off_runtime<T, F>(what: &'static str, work: F) -> Result<T, InferenceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InferenceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => Err(InferenceError::Unexpected(format!("{what} task failed: {e}"))),
    }
}

#[derive(Clone)]
pub struct Merger {
    client: Arc<dyn InferenceClient>,
    endpoint: String,
    poll_interval: Duration,
}

impl Merger {
    pub fn new(client: Arc<dyn InferenceClient>, endpoint: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            poll_interval,
        }
    }

    /// Starts a run on its own task and returns the handle the session keeps.
    pub fn spawn(&self, template: Payload, images: Vec<UploadedImage>) -> MergeRun {
        let (tx, rx) = watch::channel(MergeStatus::new(MergePhase::Encoding));
        let cancel = CancellationToken::new();

        let merger = self.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let outcome = merger.run(&template, &images, &tx, &token).await;
            tracing::debug!(?outcome, "merge run finished");
        });

        MergeRun { status: rx, cancel }
    }

    /// Runs one merge attempt to completion. Never panics or propagates:
    /// every failure ends in the `Errored` phase with the advisory message.
    pub async fn run(
        &self,
        template: &Payload,
        images: &[UploadedImage],
        status: &watch::Sender<MergeStatus>,
        cancel: &CancellationToken,
    ) -> MergeOutcome {
        if images.is_empty() {
            status.send_replace(MergeStatus::new(MergePhase::Idle));
            return MergeOutcome::NothingToSubmit;
        }

        match self.attempt(template, images, status, cancel).await {
            Ok(slots) => MergeOutcome::Rendered { slots },
            Err(Fault::Cancelled) => {
                tracing::info!("merge cancelled, session ended");
                status.send_modify(|s| {
                    s.phase = MergePhase::Idle;
                    s.progress = None;
                });
                MergeOutcome::Cancelled
            }
            Err(Fault::Inference(err)) => {
                match &err {
                    InferenceError::Client(detail) => {
                        tracing::error!(branch = err.branch(), %detail, "merge failed (client error)")
                    }
                    InferenceError::Server(detail) => {
                        tracing::error!(branch = err.branch(), %detail, "merge failed (server error)")
                    }
                    InferenceError::Unexpected(detail) => {
                        tracing::error!(branch = err.branch(), %detail, "merge failed (unexpected error)")
                    }
                }
                status.send_modify(|s| {
                    s.phase = MergePhase::Errored;
                    s.progress = None;
                    s.message = Some(ADVISORY.to_string());
                });
                MergeOutcome::Failed(err)
            }
        }
    }

    async fn attempt(
        &self,
        template: &Payload,
        images: &[UploadedImage],
        status: &watch::Sender<MergeStatus>,
        cancel: &CancellationToken,
    ) -> Result<usize, Fault> {
        let start = Instant::now();
        status.send_replace(MergeStatus::new(MergePhase::Encoding));

        let uploads = images.to_vec();
        let encoded = off_runtime("encoder", move || encode_uploads(&uploads)).await?;

        let request = build_request(template, encoded);
        let slots = requested_slots(&request);

        status.send_modify(|s| {
            s.phase = MergePhase::Submitted;
            s.progress = Some(Progress::start());
        });
        let handle = self.client.submit_async(&self.endpoint, &request).await?;
        tracing::info!(images = images.len(), slots, response_id = %handle.response_id, "🚀 merge submitted");

        status.send_modify(|s| s.phase = MergePhase::Polling);
        let mut progress = Progress::start();
        loop {
            if cancel.is_cancelled() {
                return Err(Fault::Cancelled);
            }
            tokio::time::sleep(self.poll_interval).await;
            if cancel.is_cancelled() {
                return Err(Fault::Cancelled);
            }

            progress.tick();
            let current = progress.clone();
            status.send_modify(|s| s.progress = Some(current));

            if self.client.is_ready(&handle).await? {
                break;
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        status.send_modify(|s| {
            s.phase = MergePhase::Ready;
            s.progress = None;
            s.elapsed_secs = Some(elapsed);
            s.summary = Some(format!("OctoMerged images in {elapsed:.2}s"));
        });

        let result = self.client.fetch_result(&handle).await?;
        let gallery = off_runtime("gallery", move || render_gallery(&result, slots)).await?;
        tracing::info!(slots, elapsed_secs = elapsed, "✅ merge rendered");

        status.send_modify(|s| {
            s.phase = MergePhase::Rendered;
            s.gallery = gallery;
        });
        Ok(slots)
    }
}

/// Reads the slot count a payload asks for, falling back to one.
pub fn requested_slots(payload: &Payload) -> usize {
    num_images(payload).unwrap_or(1)
}
