//! Per-user session state and the registry that owns it.

use crate::merge::{CancellationToken, MergeStatus};
use crate::presets::{Catalog, Payload, Preset};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("preset index {index} is not one of the {offered} offered presets")]
    PresetOutOfRange { index: usize, offered: usize },
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Handle to the merge run attached to a session.
#[derive(Debug)]
pub struct MergeRun {
    pub status: watch::Receiver<MergeStatus>,
    pub cancel: CancellationToken,
}

impl MergeRun {
    pub fn is_active(&self) -> bool {
        self.status.borrow().phase.is_active()
    }
}

#[derive(Debug)]
pub struct Session {
    preset: Preset,
    payload: Payload,
    images: Vec<UploadedImage>,
    previous_index: usize,
    run: Option<MergeRun>,
}

impl Session {
    pub fn new(catalog: &Catalog) -> Self {
        let preset = catalog.first().clone();
        Self {
            payload: preset.payload.clone(),
            preset,
            images: Vec::new(),
            previous_index: 0,
            run: None,
        }
    }

    /// Switches to the preset at `index`. Returns `false` when it was already selected.
    pub fn select_preset(&mut self, catalog: &Catalog, index: usize) -> Result<bool, SessionError> {
        let offered = catalog.quick_select();
        let preset = offered.get(index).ok_or(SessionError::PresetOutOfRange {
            index,
            offered: offered.len(),
        })?;

        if index == self.previous_index {
            return Ok(false);
        }

        self.preset = preset.clone();
        self.payload = preset.payload.clone();
        self.previous_index = index;
        Ok(true)
    }

    /// Replaces the uploaded images, the way a new file selection does.
    pub fn set_images(&mut self, images: Vec<UploadedImage>) {
        self.images = images;
    }

    pub fn images(&self) -> &[UploadedImage] {
        &self.images
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn previous_index(&self) -> usize {
        self.previous_index
    }

    pub fn run(&self) -> Option<&MergeRun> {
        self.run.as_ref()
    }

    pub fn attach_run(&mut self, run: MergeRun) {
        self.run = Some(run);
    }

    /// Trips the cancellation token of a running merge, if any.
    pub fn end(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
        }
    }

    pub fn snapshot(&self, id: Uuid) -> SessionSnapshot {
        SessionSnapshot {
            id,
            preset: PresetSummary {
                index: self.previous_index,
                name: self.preset.name.clone(),
                caption: self.preset.caption.clone(),
                num_images: self.preset.num_images(),
            },
            payload: self.payload.clone(),
            images: self
                .images
                .iter()
                .map(|img| ImageSummary {
                    filename: img.filename.clone(),
                    size: img.bytes.len(),
                })
                .collect(),
            previous_index: self.previous_index,
            merge: self.run.as_ref().map(|run| run.status.borrow().clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PresetSummary {
    pub index: usize,
    pub name: String,
    pub caption: String,
    pub num_images: usize,
}

#[derive(Debug, Serialize)]
pub struct ImageSummary {
    pub filename: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub preset: PresetSummary,
    pub payload: Payload,
    pub images: Vec<ImageSummary>,
    pub previous_index: usize,
    pub merge: Option<MergeStatus>,
}

pub type SharedSession = Arc<Mutex<Session>>;

struct Entry {
    session: SharedSession,
    last_seen: Instant,
}

/// Live sessions keyed by id. Each session is locked independently.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, catalog: &Catalog) -> (Uuid, SharedSession) {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(catalog)));
        let entry = Entry {
            session: session.clone(),
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        tracing::debug!(%id, "session started");
        (id, session)
    }

    /// Looks a session up and marks it as seen.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    /// Removes a session and cancels its merge run. Returns `false` if it did not exist.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(entry) => {
                entry.session.lock().await.end();
                tracing::debug!(%id, "session ended");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Removes every session not seen for `max_idle`. Returns how many went.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<Uuid> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.last_seen.elapsed() >= max_idle)
            .map(|(id, _)| *id)
            .collect();

        let mut removed = 0;
        for id in stale {
            if self.remove(id).await {
                removed += 1;
            }
        }
        removed
    }

    /// Expires idle sessions every `every` until the returned task is aborted.
    pub fn spawn_sweeper(&self, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.expire_idle(max_idle).await;
                if removed > 0 {
                    let live = store.len().await;
                    tracing::info!(removed, live, "🧹 idle sessions expired");
                }
            }
        })
    }
}
