//! Order reconciliation across storage locations and schema variants.
//!
//! Orders were historically written to several blobs (a primary collection
//! plus backups) and under several layouts: the customer email may sit at
//! the top level or inside `shippingInfo`, `customer` or `user`. The
//! [`ReconciliationEngine`] loads every configured location, merges the
//! records, extracts one normalized email per record and rebuilds each
//! match into the canonical [`Order`].
//!
//! Records are merged without deduplication: an order present in two
//! locations is returned twice and counted twice.
//!
//! A record that cannot be interpreted is logged and skipped; it never
//! fails the lookup.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_response::AppResponse;
use crate::blob_store::BlobStore;
use crate::collection::sanitize_key;
use crate::document::{json_kind, Document};
use crate::order_model::{Order, OrderItem, OrdersLookup, DEFAULT_ORDER_STATUS};

/// Locations searched when no source list is configured, in precedence order.
pub const DEFAULT_ORDER_SOURCES: [&str; 4] = ["orders", "orders_backup", "all_orders", "user_orders"];

const UNKNOWN_ID: &str = "unknown";

/// A place inside an order record where the customer email may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailField {
    /// Top-level `email`.
    Email,
    /// `shippingInfo.email`.
    ShippingInfo,
    /// `customer.email`.
    Customer,
    /// `user.email`.
    User,
}

impl EmailField {
    fn locate<'a>(&self, doc: &'a Document) -> Option<&'a JsonValue> {
        let container = match self {
            EmailField::Email => return doc.get("email"),
            EmailField::ShippingInfo => "shippingInfo",
            EmailField::Customer => "customer",
            EmailField::User => "user",
        };
        doc.get(container)?.as_object()?.get("email")
    }
}

/// How records from several locations are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Concatenate every location.
    MergeAll,
    /// Use the first location that yields at least one record.
    FirstNonEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Storage locations, in precedence order.
    pub sources: Vec<String>,
    pub load_policy: LoadPolicy,
    /// Email locations, checked in order; the first non-empty one wins.
    pub email_fields: Vec<EmailField>,
    pub default_status: String,
    /// Log which emails do exist when a lookup finds nothing.
    pub diagnostics: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self::exhaustive()
    }
}

impl ReconcileConfig {
    /// Every known location merged, every email layout checked.
    pub fn exhaustive() -> Self {
        Self {
            sources: DEFAULT_ORDER_SOURCES.iter().map(|s| s.to_string()).collect(),
            load_policy: LoadPolicy::MergeAll,
            email_fields: vec![
                EmailField::Email,
                EmailField::ShippingInfo,
                EmailField::Customer,
                EmailField::User,
            ],
            default_status: DEFAULT_ORDER_STATUS.to_string(),
            diagnostics: true,
        }
    }

    /// Primary collection, falling back to the backup only when the primary
    /// is empty; top-level email before shipping email.
    pub fn primary_with_backup() -> Self {
        Self {
            sources: vec!["orders".to_string(), "orders_backup".to_string()],
            load_policy: LoadPolicy::FirstNonEmpty,
            email_fields: vec![EmailField::Email, EmailField::ShippingInfo],
            ..Self::exhaustive()
        }
    }

    /// Like [`primary_with_backup`](Self::primary_with_backup) but the
    /// shipping email takes precedence over the top-level one.
    pub fn shipping_first() -> Self {
        Self {
            email_fields: vec![EmailField::ShippingInfo, EmailField::Email],
            diagnostics: false,
            ..Self::primary_with_backup()
        }
    }
}

/// Emails present in the searched records, for troubleshooting lookups
/// that found nothing. Never used for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailDiagnostics {
    pub known_emails: BTreeSet<String>,
    /// Known emails equal to the query or sharing its domain.
    pub similar_emails: Vec<String>,
}

/// Lower-cased, trimmed form used for every email comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct ReconciliationEngine {
    backend: Arc<dyn BlobStore>,
    config: ReconcileConfig,
}

impl ReconciliationEngine {
    pub fn new(backend: Arc<dyn BlobStore>, config: ReconcileConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Every order belonging to `email`, searched in `sources` (collection
    /// names, in precedence order).
    pub fn find_orders_by_email<S: AsRef<str>>(&self, email: &str, sources: &[S]) -> OrdersLookup {
        let query = normalize_email(email);
        if query.is_empty() {
            info!("Order lookup skipped: empty email");
            return OrdersLookup::default();
        }

        let records = self.load_documents(sources);
        info!("Reconciling {} order records for {query}", records.len());

        let mut orders = Vec::new();
        for record in &records {
            let Some(candidate) = self.extract_email(record) else {
                continue;
            };
            if candidate != query {
                continue;
            }
            match self.canonicalize(record, candidate) {
                Ok(order) => {
                    debug!("Matched order {}", order.id);
                    orders.push(order);
                }
                Err(e) => warn!("Skipping order {}: {e}", record.id().unwrap_or(UNKNOWN_ID)),
            }
        }

        info!("Found {} orders for {query}", orders.len());
        if orders.is_empty() && self.config.diagnostics {
            let diagnostics = self.diagnose(&query, &records);
            info!(
                "No orders for {query} across {:?}; emails on file: {:?}; similar: {:?}",
                sources.iter().map(|s| s.as_ref()).collect::<Vec<&str>>(),
                diagnostics.known_emails,
                diagnostics.similar_emails
            );
        }
        OrdersLookup::new(orders)
    }

    /// [`find_orders_by_email`](Self::find_orders_by_email) over the
    /// configured sources.
    pub fn find_in_configured_sources(&self, email: &str) -> OrdersLookup {
        self.find_orders_by_email(email, self.config.sources.as_slice())
    }

    /// Loads and merges the records of every location.
    ///
    /// A location may hold a bare array of orders or an object with an
    /// `orders` array. Unreadable or differently shaped locations and
    /// non-object entries are logged and skipped.
    pub fn load_documents<S: AsRef<str>>(&self, sources: &[S]) -> Vec<Document> {
        let mut merged = Vec::new();
        for source in sources {
            let key = sanitize_key(source.as_ref());
            let records = match self.load_source(&key) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Error loading orders from {key}: {e}");
                    continue;
                }
            };
            info!("Loaded {} orders from {key}", records.len());

            let found = !records.is_empty();
            merged.extend(records);
            if found && self.config.load_policy == LoadPolicy::FirstNonEmpty {
                break;
            }
        }
        merged
    }

    fn load_source(&self, key: &str) -> Result<Vec<Document>, AppResponse> {
        let Some(text) = self.backend.read(key)? else {
            return Ok(Vec::new());
        };
        let entries = match serde_json::from_str::<JsonValue>(&text)? {
            JsonValue::Array(entries) => entries,
            JsonValue::Object(mut wrapper) => match wrapper.remove("orders") {
                Some(JsonValue::Array(entries)) => entries,
                _ => {
                    return Err(AppResponse::MalformedDocument(
                        "object blob without an 'orders' array".to_string(),
                    ))
                }
            },
            other => {
                return Err(AppResponse::MalformedDocument(format!(
                    "blob is a JSON {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(entries
            .into_iter()
            .filter_map(|entry| match Document::try_from(entry) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!("Skipping invalid order entry in {key}: {e}");
                    None
                }
            })
            .collect())
    }

    /// The record's normalized email, taken from the first configured
    /// location holding a non-blank string.
    pub fn extract_email(&self, doc: &Document) -> Option<String> {
        self.config.email_fields.iter().find_map(|field| {
            let candidate = normalize_email(field.locate(doc)?.as_str()?);
            (!candidate.is_empty()).then_some(candidate)
        })
    }

    /// Rebuilds a raw record into the canonical order shape, defaulting
    /// absent fields. Fails only when a present field cannot be coerced.
    pub fn canonicalize(&self, doc: &Document, email: String) -> Result<Order, AppResponse> {
        let items = match doc.get("items") {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(entries)) => entries
                .iter()
                .filter_map(JsonValue::as_object)
                .map(canonical_item)
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(AppResponse::MalformedDocument(format!(
                    "items is a JSON {}",
                    json_kind(other)
                )))
            }
        };

        let status = match doc.get("status") {
            None | Some(JsonValue::Null) => self.config.default_status.clone(),
            Some(JsonValue::String(s)) => s.clone(),
            Some(other) => {
                return Err(AppResponse::MalformedDocument(format!(
                    "status is a JSON {}",
                    json_kind(other)
                )))
            }
        };

        Ok(Order {
            id: id_like(doc.get("id")).unwrap_or_else(|| UNKNOWN_ID.to_string()),
            user_id: doc
                .str_field("userId")
                .or_else(|| doc.str_field("user_id"))
                .map(str::to_string),
            items,
            total_amount: coerce_f64(doc.get("totalAmount"), 0.0, "totalAmount")?,
            status,
            created_at: doc.str_field("createdAt").unwrap_or_default().to_string(),
            email,
            payment_method: doc.str_field("paymentMethod").map(str::to_string),
        })
    }

    /// Collects the emails present in `docs` and those resembling `email`.
    pub fn diagnose(&self, email: &str, docs: &[Document]) -> EmailDiagnostics {
        let query = normalize_email(email);
        let domain = query.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("");

        let known_emails: BTreeSet<String> = docs
            .iter()
            .flat_map(|doc| {
                self.config
                    .email_fields
                    .iter()
                    .filter_map(|field| field.locate(doc)?.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        let similar_emails = known_emails
            .iter()
            .filter(|known| {
                let known = normalize_email(known);
                known == query || (!domain.is_empty() && known.ends_with(domain))
            })
            .cloned()
            .collect();

        EmailDiagnostics {
            known_emails,
            similar_emails,
        }
    }
}

fn canonical_item(item: &Map<String, JsonValue>) -> Result<OrderItem, AppResponse> {
    let text = |field: &str| item.get(field).and_then(JsonValue::as_str).map(str::to_string);
    Ok(OrderItem {
        id: id_like(item.get("id")).unwrap_or_else(|| UNKNOWN_ID.to_string()),
        name: text("name"),
        price: coerce_f64(item.get("price"), 0.0, "price")?,
        quantity: coerce_i64(item.get("quantity"), 1, "quantity")?,
        image: text("image"),
    })
}

/// Ids are strings, but legacy records sometimes stored numbers.
fn id_like(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_f64(value: Option<&JsonValue>, default: f64, field: &str) -> Result<f64, AppResponse> {
    let malformed = || AppResponse::MalformedDocument(format!("{field} is not a number"));
    match value {
        None | Some(JsonValue::Null) => Ok(default),
        Some(JsonValue::Number(n)) => n.as_f64().ok_or_else(malformed),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(malformed),
        Some(_) => Err(malformed()),
    }
}

/// Integer coercion; fractional numbers are truncated toward zero.
fn coerce_i64(value: Option<&JsonValue>, default: i64, field: &str) -> Result<i64, AppResponse> {
    let malformed = || AppResponse::MalformedDocument(format!("{field} is not an integer"));
    match value {
        None | Some(JsonValue::Null) => Ok(default),
        Some(JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => Ok(i),
            None => n
                .as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
                .ok_or_else(malformed),
        },
        Some(JsonValue::String(s)) => s.trim().parse::<i64>().map_err(|_| malformed()),
        Some(_) => Err(malformed()),
    }
}
