//! OctoMerge: upload photos, pick a blending preset, and let a remote SDXL
//! endpoint merge them.
//!
//! Modules:
//! - `api`: Axum handlers and router setup used by the binary.
//! - `codec`: PNG + base64 image transport encoding.
//! - `config`: Env-driven configuration loader.
//! - `error`: HTTP-facing error type.
//! - `inference`: Async inference client trait and the OctoAI HTTP client.
//! - `merge`: The submit / poll / render flow.
//! - `page`: The single-page UI.
//! - `presets`: Preset catalog loading.
//! - `session`: Per-user session state.
pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod inference;
pub mod merge;
pub mod page;
pub mod presets;
pub mod session;

pub use api::{router, AppState};
pub use config::Config;
pub use inference::{InferenceClient, InferenceError, OctoAiClient};
pub use merge::Merger;
pub use presets::Catalog;
