//! Record identifiers and timestamps.
//!
//! Every component that creates documents takes its ids and its
//! `createdAt`/`updatedAt` values from here.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Separator placed between an entity prefix and the generated id.
pub const ID_SEPARATOR: char = '_';

/// Generates a globally unique opaque id, optionally tagged with an
/// entity prefix (`"user_3f0c..."`).
///
/// An empty prefix behaves like no prefix.
pub fn generate_id(prefix: Option<&str>) -> String {
    let uid = Uuid::new_v4().to_string();
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}{ID_SEPARATOR}{uid}"),
        _ => uid,
    }
}

/// Current UTC time as a fixed-width ISO-8601 string.
///
/// The width never varies (microsecond precision, `Z` suffix), so
/// comparing two timestamps as strings orders them chronologically.
pub fn get_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
