//! Preset catalog: named example configurations loaded once at startup.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Request body sent to the inference service.
pub type Payload = Map<String, Value>;

/// Number of presets offered as quick-select thumbnails.
pub const QUICK_SELECT_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read preset catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed preset catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("preset catalog is empty")]
    Empty,

    #[error("preset {name:?}: payload.num_images must be a positive integer")]
    NumImages { name: String },
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    payload: Payload,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    pub name: String,
    /// File name relative to the assets directory.
    pub thumbnail: String,
    pub caption: String,
    pub payload: Payload,
}

impl Preset {
    pub fn num_images(&self) -> usize {
        num_images(&self.payload).unwrap_or(1)
    }
}

/// Reads `num_images` from a payload, if it holds a positive integer.
pub fn num_images(payload: &Payload) -> Option<usize> {
    payload
        .get("num_images")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
}

fn default_thumbnail(name: &str) -> String {
    format!("{}_small.png", name.to_lowercase().replace(' ', "_"))
}

/// Presets in catalog order.
#[derive(Debug, Clone)]
pub struct Catalog {
    presets: Vec<Preset>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let entries: IndexMap<String, CatalogEntry> = serde_json::from_str(raw)?;
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let presets = entries
            .into_iter()
            .map(|(name, entry)| {
                if num_images(&entry.payload).is_none() {
                    return Err(CatalogError::NumImages { name });
                }
                Ok(Preset {
                    thumbnail: entry.thumbnail.unwrap_or_else(|| default_thumbnail(&name)),
                    caption: entry.caption.unwrap_or_else(|| name.clone()),
                    payload: entry.payload,
                    name,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { presets })
    }

    /// The first preset; new sessions start from it.
    pub fn first(&self) -> &Preset {
        &self.presets[0]
    }

    /// Presets offered in the picker.
    pub fn quick_select(&self) -> &[Preset] {
        &self.presets[..self.presets.len().min(QUICK_SELECT_LEN)]
    }

    // Loading rejects an empty catalog, so there is no `is_empty`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.presets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = r#"{
        "Dissolve": { "payload": { "num_images": 4, "prompt": "dissolve" } },
        "Double Exposure": { "payload": { "num_images": 2 }, "caption": "Double exposure" },
        "Mosaic": { "payload": { "num_images": 1 }, "thumbnail": "mosaic.png" },
        "Collage": { "payload": { "num_images": 3 } },
        "Neon": { "payload": { "num_images": 2 } }
    }"#;

    #[test]
    fn keeps_catalog_order_and_fills_defaults() {
        let catalog = Catalog::from_json(CATALOG).unwrap();
        let names: Vec<_> = catalog.quick_select().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Dissolve", "Double Exposure", "Mosaic", "Collage"]);
        assert_eq!(catalog.len(), 5);

        let exposure = &catalog.quick_select()[1];
        assert_eq!(exposure.thumbnail, "double_exposure_small.png");
        assert_eq!(exposure.caption, "Double exposure");

        let mosaic = &catalog.quick_select()[2];
        assert_eq!(mosaic.thumbnail, "mosaic.png");
        assert_eq!(mosaic.caption, "Mosaic");
        assert_eq!(catalog.first().num_images(), 4);
    }

    #[test]
    fn short_catalog_offers_every_preset() {
        let catalog = Catalog::from_json(r#"{"Only": {"payload": {"num_images": 1}}}"#).unwrap();
        assert_eq!(catalog.quick_select().len(), 1);
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(Catalog::from_json("{}"), Err(CatalogError::Empty)));
    }

    #[test]
    fn rejects_missing_num_images() {
        let err = Catalog::from_json(r#"{"Broken": {"payload": {"prompt": "x"}}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::NumImages { name } if name == "Broken"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(Catalog::from_json("{ not json"), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.first().name, "Dissolve");
    }

    #[test]
    fn load_fails_on_missing_file() {
        let err = Catalog::load("/definitely/not/here/presets.json").unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }
}
