use std::fmt::{Display, Formatter};

use lmdb::Error as LmdbError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

/// Outcome of a store operation, also used as the error type of every
/// fallible call in the crate.
///
/// The variants follow the store's fault taxonomy: backend faults are
/// `StorageUnavailable`, a single bad record is `MalformedDocument`, an
/// absent id is `NotFound` and a broken business contract is
/// `ValidationFailure`. `BadRequest` and `Ok` only appear at the C ABI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppResponse {
    StorageUnavailable(String),
    MalformedDocument(String),
    NotFound(String),
    ValidationFailure(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            AppResponse::MalformedDocument(msg) => write!(f, "Malformed document: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::ValidationFailure(msg) => write!(f, "Validation failure: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl std::error::Error for AppResponse {}

impl From<LmdbError> for AppResponse {
    fn from(err: LmdbError) -> Self {
        match err {
            LmdbError::NotFound => AppResponse::NotFound("Key not found".to_string()),
            LmdbError::MapFull => {
                AppResponse::StorageUnavailable("LMDB map is full, raise map_size_mb".to_string())
            }
            LmdbError::Corrupted => {
                AppResponse::StorageUnavailable("Database is corrupted".to_string())
            }
            _ => AppResponse::StorageUnavailable(format!("LMDB error: {}", err)),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::MalformedDocument(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for AppResponse {
    fn from(err: std::io::Error) -> Self {
        AppResponse::StorageUnavailable(format!("IO error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }

    /// True for faults of the storage backend itself, the only kind that
    /// aborts a whole operation.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, AppResponse::StorageUnavailable(_))
    }
}
