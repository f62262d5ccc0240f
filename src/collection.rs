//! Generic document collection.
//!
//! A [`DocumentStore`] is one named collection persisted as a single JSON
//! array blob. Every mutation reads the whole collection, changes it in
//! memory and rewrites the whole blob while holding the collection's
//! writer lock, so concurrent writers cannot lose each other's updates.
//! Readers take no lock; the backend guarantees they see either the old or
//! the new blob.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::blob_store::BlobStore;
use crate::document::{json_kind, Document, ID_FIELD};
use crate::filter::Filter;
use crate::identity::{generate_id, get_timestamp};
use crate::locks::CollectionLock;

/// Hook applied to every document as it is read from storage.
pub type ReadHook = fn(&mut Document);

/// Strips every character outside `[A-Za-z0-9._-]` from a collection name.
pub fn sanitize_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Parses a collection blob into documents.
///
/// The blob must be a JSON array. Entries that are not objects are
/// dropped and logged.
pub(crate) fn parse_collection(name: &str, text: &str) -> Result<Vec<Document>, AppResponse> {
    let value: JsonValue = serde_json::from_str(text)?;
    let entries = match value {
        JsonValue::Array(entries) => entries,
        other => {
            return Err(AppResponse::MalformedDocument(format!(
                "collection '{name}' is a JSON {} instead of an array",
                json_kind(&other)
            )))
        }
    };

    let mut docs = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        match Document::try_from(entry) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!("Skipping entry {position} of '{name}': {e}"),
        }
    }
    Ok(docs)
}

#[derive(Clone)]
pub struct DocumentStore {
    name: String,
    backend: Arc<dyn BlobStore>,
    lock: Arc<CollectionLock>,
    read_hook: Option<ReadHook>,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Builds a handle on collection `name` (sanitized before use).
    ///
    /// All handles on the same collection must share `lock`; the
    /// [`AppDbState`](crate::store_state::AppDbState) takes care of that.
    pub fn new(name: &str, backend: Arc<dyn BlobStore>, lock: Arc<CollectionLock>) -> Self {
        Self {
            name: sanitize_key(name),
            backend,
            lock,
            read_hook: None,
        }
    }

    pub fn with_read_hook(mut self, hook: ReadHook) -> Self {
        self.read_hook = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads the collection, propagating backend and parse faults.
    ///
    /// A collection that was never written is empty. The read hook, if
    /// any, is applied to every returned document.
    pub fn try_get_all(&self) -> Result<Vec<Document>, AppResponse> {
        let mut docs = self.load_raw()?;
        if let Some(hook) = self.read_hook {
            docs.iter_mut().for_each(hook);
        }
        Ok(docs)
    }

    /// The documents exactly as stored, without the read hook.
    fn load_raw(&self) -> Result<Vec<Document>, AppResponse> {
        let Some(text) = self.backend.read(&self.name)? else {
            return Ok(Vec::new());
        };
        parse_collection(&self.name, &text)
    }

    /// Every document of the collection, in stored order.
    ///
    /// Never fails: an unreadable or malformed blob is logged and reads as
    /// an empty collection.
    pub fn get_all(&self) -> Vec<Document> {
        match self.try_get_all() {
            Ok(docs) => docs,
            Err(e) => {
                warn!("Error getting {}: {e}", self.name);
                Vec::new()
            }
        }
    }

    /// Replaces the whole collection. Returns false when the documents were
    /// not durably written.
    pub fn save_all(&self, docs: &[Document]) -> bool {
        let text = match serde_json::to_string(docs) {
            Ok(text) => text,
            Err(e) => {
                warn!("Error serializing {}: {e}", self.name);
                return false;
            }
        };
        match self.backend.write(&self.name, &text) {
            Ok(()) => true,
            Err(e) => {
                warn!("Error saving {}: {e}", self.name);
                false
            }
        }
    }

    /// First document whose `id` equals `id`.
    pub fn get_by_id(&self, id: &str) -> Option<Document> {
        self.get_all().into_iter().find(|doc| doc.id() == Some(id))
    }

    /// Appends `doc` and persists the collection.
    pub fn add(&self, doc: Document) -> bool {
        self.mutate("add", |docs| {
            docs.push(doc);
            true
        })
    }

    /// Stamps `doc` with a fresh id (unless it already has one) and with
    /// `createdAt`/`updatedAt`, then adds it. Returns the stored document.
    pub fn insert_new(&self, mut doc: Document, prefix: Option<&str>) -> Option<Document> {
        if doc.id().is_none() {
            doc.insert(ID_FIELD, generate_id(prefix));
        }
        let now = get_timestamp();
        doc.insert("createdAt", now.clone());
        doc.insert("updatedAt", now);

        let stored = doc.clone();
        self.add(doc).then_some(stored)
    }

    /// Shallow-merges `patch` onto the first document with `id`.
    ///
    /// Returns false, writing nothing, when no such document exists.
    pub fn update(&self, id: &str, patch: &Document) -> bool {
        self.modify_by_id(id, |doc| doc.merge(patch))
    }

    /// Applies `change` to the first document with `id` inside one locked
    /// read-modify-write cycle.
    pub fn modify_by_id<F>(&self, id: &str, change: F) -> bool
    where
        F: FnOnce(&mut Document),
    {
        self.mutate("update", |docs| {
            match docs.iter_mut().find(|doc| doc.id() == Some(id)) {
                Some(doc) => {
                    change(doc);
                    true
                }
                None => {
                    debug!("No document with id {id} to update");
                    false
                }
            }
        })
    }

    /// Removes the first document with `id`. False if nothing matched.
    pub fn delete(&self, id: &str) -> bool {
        self.mutate("delete", |docs| {
            match docs.iter().position(|doc| doc.id() == Some(id)) {
                Some(index) => {
                    docs.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// Every document satisfying `predicate`, in stored order.
    pub fn query<P>(&self, predicate: P) -> Vec<Document>
    where
        P: Fn(&Document) -> bool,
    {
        self.get_all().into_iter().filter(|doc| predicate(doc)).collect()
    }

    pub fn find(&self, filter: &Filter) -> Vec<Document> {
        self.query(|doc| filter.matches(doc))
    }

    /// First document whose `field` equals `value`.
    pub fn get_by_field(&self, field: &str, value: &JsonValue) -> Option<Document> {
        self.get_all()
            .into_iter()
            .find(|doc| doc.get(field) == Some(value))
    }

    pub fn query_by_field(&self, field: &str, value: &JsonValue) -> Vec<Document> {
        self.query(|doc| doc.get(field) == Some(value))
    }

    pub fn count(&self) -> usize {
        self.get_all().len()
    }

    /// Runs one read-modify-write cycle under the collection lock.
    ///
    /// `change` returns whether anything changed; nothing is written when
    /// it returns false. A blob that cannot be read or parsed aborts the
    /// mutation so it is never overwritten with a partial view. `change`
    /// sees the stored documents, not their read-hook view.
    fn mutate<F>(&self, op: &str, change: F) -> bool
    where
        F: FnOnce(&mut Vec<Document>) -> bool,
    {
        let _guard = self.lock.acquire();

        let mut docs = match self.load_raw() {
            Ok(docs) => docs,
            Err(e) => {
                warn!("Refusing to {op} in {}: current contents unreadable: {e}", self.name);
                return false;
            }
        };

        if !change(&mut docs) {
            return false;
        }
        self.save_all(&docs)
    }
}
