//! Store configuration.
//!
//! Loaded from JSON, every field optional:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/storefront/store.lmdb",
//!   "map_size_mb": 256,
//!   "reconcile": { "sources": ["orders", "orders_backup"], "load_policy": "merge_all" }
//! }
//! ```
//!
//! `STOREFRONT_DATA_DIR`, `STOREFRONT_MAP_SIZE_MB` and
//! `STOREFRONT_ORDER_SOURCES` (comma separated) override the file.

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::reconcile::ReconcileConfig;

pub const ENV_DATA_DIR: &str = "STOREFRONT_DATA_DIR";
pub const ENV_MAP_SIZE_MB: &str = "STOREFRONT_MAP_SIZE_MB";
pub const ENV_ORDER_SOURCES: &str = "STOREFRONT_ORDER_SOURCES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the LMDB environment.
    pub data_dir: PathBuf,
    /// Upper bound of the LMDB memory map.
    pub map_size_mb: usize,
    pub reconcile: ReconcileConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("storefront.lmdb"),
            map_size_mb: 64,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, AppResponse> {
        serde_json::from_str(json).map_err(|e| AppResponse::BadRequest(format!("Invalid store config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppResponse> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Applies the `STOREFRONT_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_MAP_SIZE_MB) {
            match raw.trim().parse::<usize>() {
                Ok(mb) if mb > 0 => self.map_size_mb = mb,
                _ => warn!("Ignoring {ENV_MAP_SIZE_MB}={raw}: not a positive integer"),
            }
        }
        if let Some(raw) = lookup(ENV_ORDER_SOURCES) {
            let sources: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !sources.is_empty() {
                self.reconcile.sources = sources;
            }
        }
        self
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }
}
