//! Axum handlers and router setup.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::error::AppError;
use crate::merge::{MergePhase, MergeStatus, Merger};
use crate::page;
use crate::presets::Catalog;
use crate::session::{MergeRun, SessionSnapshot, SessionStore, SharedSession, UploadedImage};

/// Several full-size photos fit in one upload.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub sessions: SessionStore,
    pub merger: Merger,
}

impl AppState {
    pub fn new(catalog: Catalog, merger: Merger) -> Self {
        Self {
            catalog: Arc::new(catalog),
            sessions: SessionStore::new(),
            merger,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PresetCard {
    pub index: usize,
    pub name: String,
    pub caption: String,
    pub thumbnail_url: String,
    pub num_images: usize,
}

#[derive(Debug, Deserialize)]
pub struct SelectPreset {
    pub index: usize,
}

async fn session_for(state: &AppState, id: Uuid) -> Result<SharedSession, AppError> {
    state.sessions.get(id).await.ok_or(AppError::SessionNotFound)
}

fn is_accepted_format(bytes: &[u8]) -> bool {
    matches!(image::guess_format(bytes), Ok(ImageFormat::Png | ImageFormat::Jpeg))
}

async fn list_presets(State(state): State<AppState>) -> Json<Vec<PresetCard>> {
    let cards = state
        .catalog
        .quick_select()
        .iter()
        .enumerate()
        .map(|(index, preset)| PresetCard {
            index,
            name: preset.name.clone(),
            caption: preset.caption.clone(),
            thumbnail_url: format!("/assets/{}", preset.thumbnail),
            num_images: preset.num_images(),
        })
        .collect();
    Json(cards)
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let (id, session) = state.sessions.create(&state.catalog).await;
    let snapshot = session.lock().await.snapshot(id);
    (StatusCode::CREATED, Json(snapshot))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = session_for(&state, id).await?;
    let snapshot = session.lock().await.snapshot(id);
    Ok(Json(snapshot))
}

async fn end_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::SessionNotFound)
    }
}

async fn select_preset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SelectPreset>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = session_for(&state, id).await?;
    let mut session = session.lock().await;
    if session.select_preset(&state.catalog, body.index)? {
        tracing::info!(%id, preset = %session.preset().name, "preset selected");
    }
    Ok(Json(session.snapshot(id)))
}

async fn upload_images(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = session_for(&state, id).await?;

    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}", images.len() + 1));
        let data = field.bytes().await?;

        if !is_accepted_format(&data) {
            return Err(AppError::UnsupportedUpload(filename));
        }
        images.push(UploadedImage {
            filename,
            bytes: data.to_vec(),
        });
    }

    let mut session = session.lock().await;
    tracing::info!(%id, count = images.len(), "📸 images uploaded");
    session.set_images(images);
    Ok(Json(session.snapshot(id)))
}

async fn start_merge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<MergeStatus>), AppError> {
    let session = session_for(&state, id).await?;
    let mut session = session.lock().await;

    if session.images().is_empty() {
        return Err(AppError::NoImages);
    }
    if session.run().is_some_and(MergeRun::is_active) {
        return Err(AppError::MergeInProgress);
    }

    let run = state
        .merger
        .spawn(session.payload().clone(), session.images().to_vec());
    let status = run.status.borrow().clone();
    session.attach_run(run);

    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn merge_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MergeStatus>, AppError> {
    let session = session_for(&state, id).await?;
    let session = session.lock().await;
    let status = match session.run() {
        Some(run) => run.status.borrow().clone(),
        None => MergeStatus::new(MergePhase::Idle),
    };
    Ok(Json(status))
}

pub fn router(state: AppState, assets_dir: impl AsRef<std::path::Path>) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/api/presets", get(list_presets))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(end_session))
        .route("/api/sessions/:id/preset", put(select_preset))
        .route("/api/sessions/:id/images", put(upload_images))
        .route("/api/sessions/:id/merge", get(merge_status).post(start_merge))
        .nest_service("/assets", ServeDir::new(assets_dir.as_ref()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
