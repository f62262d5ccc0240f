//! Document definition for collection storage.
//!
//! A [`Document`] is the atom of storage: an open map of field name to JSON
//! value. The store enforces no schema beyond the convention that a
//! persisted document carries a unique string `id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_response::AppResponse;

/// Name of the identifying field of every persisted document.
pub const ID_FIELD: &str = "id";

/// A schema-open record stored inside a collection.
///
/// `Document` serializes transparently as a JSON object, so a collection
/// blob is simply a JSON array of these.
///
/// # Examples
///
/// ```rust
/// use storefront_core::document::Document;
/// use serde_json::json;
///
/// let doc = Document::try_from(json!({
///     "id": "ord-1",
///     "status": "pending",
///     "shippingInfo": { "email": "jane@example.com" }
/// }))?;
///
/// assert_eq!(doc.id(), Some("ord-1"));
/// assert_eq!(doc.str_at("shippingInfo.email"), Some("jane@example.com"));
/// # Ok::<(), storefront_core::AppResponse>(())
/// ```
///
/// # Merge semantics
///
/// [`Document::merge`] is shallow: top-level keys of the patch replace the
/// stored values wholesale, nested objects are not merged recursively, and
/// keys absent from the patch keep their prior value.
///
/// ```rust
/// use storefront_core::document::Document;
/// use serde_json::json;
///
/// let mut stored = Document::try_from(json!({"id": "o1", "status": "pending", "total": 10}))?;
/// let patch = Document::try_from(json!({"status": "shipped"}))?;
/// stored.merge(&patch);
///
/// assert_eq!(stored.str_field("status"), Some("shipped"));
/// assert_eq!(stored.get("total"), Some(&json!(10)));
/// # Ok::<(), storefront_core::AppResponse>(())
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, JsonValue>);

impl Document {
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// The document's `id`, when present and a string.
    pub fn id(&self) -> Option<&str> {
        self.str_field(ID_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Sets `field`, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Option<JsonValue> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<JsonValue> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    /// A top-level string field.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(JsonValue::as_str)
    }

    /// Resolves a dotted path (`"shippingInfo.email"`) through nested objects.
    ///
    /// Returns `None` as soon as a segment is missing or an intermediate
    /// value is not an object.
    pub fn value_at(&self, path: &str) -> Option<&JsonValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// String value at a dotted path.
    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.value_at(path).and_then(JsonValue::as_str)
    }

    /// Shallow merge: every top-level field of `patch` overwrites the field
    /// of the same name here.
    pub fn merge(&mut self, patch: &Document) {
        for (key, value) in patch.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }
}

impl From<Map<String, JsonValue>> for Document {
    fn from(map: Map<String, JsonValue>) -> Self {
        Document(map)
    }
}

impl TryFrom<JsonValue> for Document {
    type Error = AppResponse;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Object(map) => Ok(Document(map)),
            other => Err(AppResponse::MalformedDocument(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

impl From<Document> for JsonValue {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

/// Short name of a JSON value's type, for log and error messages.
pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
