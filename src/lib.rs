//! # Storefront Core
//!
//! The storage core of a storefront backend: a small embedded JSON document
//! store on LMDB, and an order reconciliation engine that finds a customer's
//! orders across several storage locations and historical schemas.
//!
//! ## Features
//!
//! - **Collections as blobs**: one collection is one JSON array stored under
//!   its sanitized name; every mutation is a locked read-modify-write of the
//!   whole array
//! - **Typed collections**: users, addresses, orders, products, reviews and
//!   carts with their domain lookups
//! - **Reconciliation**: orders-by-email across primary and backup locations,
//!   tolerant of four email layouts and of malformed records
//! - **C ABI**: every operation is reachable from a foreign HTTP layer and
//!   answers with a JSON-encoded [`AppResponse`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use storefront_core::{AppDbState, Document, StoreConfig};
//! use serde_json::json;
//!
//! let state = AppDbState::init(&StoreConfig::with_data_dir("shop.lmdb"))?;
//!
//! let order = Document::try_from(json!({
//!     "id": "ord-1",
//!     "status": "pending",
//!     "shippingInfo": { "email": "Jane@Example.com" }
//! }))?;
//! state.orders().add(order);
//!
//! let found = state.find_orders_by_email("jane@example.com");
//! assert_eq!(found.total, 1);
//! # Ok::<(), storefront_core::AppResponse>(())
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_store`] / [`create_store_with_config`] - Open the store
//! - [`collection_get_all`] - Every document of a collection
//! - [`collection_get_by_id`] - One document by id
//! - [`collection_add`] - Append a document
//! - [`collection_update`] - Shallow-merge a patch onto a document
//! - [`collection_delete`] - Remove a document
//! - [`collection_query`] - Documents matching a JSON [`Filter`]
//! - [`find_orders_by_email`] - Reconciled orders of a customer
//! - [`free_response`] - Release a returned string
//! - [`close_store`] - Release the store

pub mod app_response;
pub mod blob_store;
pub mod collection;
pub mod collections;
pub mod config;
pub mod document;
pub mod filter;
pub mod identity;
pub mod listing;
pub mod lmdb_store;
pub mod locks;
pub mod order_model;
pub mod reconcile;
pub mod store_state;

pub use crate::app_response::AppResponse;
pub use crate::collection::DocumentStore;
pub use crate::config::StoreConfig;
pub use crate::document::Document;
pub use crate::filter::Filter;
pub use crate::identity::{generate_id, get_timestamp};
pub use crate::order_model::{Order, OrderItem, OrderStatus, OrdersLookup};
pub use crate::reconcile::{ReconcileConfig, ReconciliationEngine};
pub use crate::store_state::AppDbState;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};

/// Opens the store in the LMDB directory `path`.
///
/// Environment overrides (`STOREFRONT_*`) apply on top of the defaults.
///
/// # Returns
///
/// A pointer to the [`AppDbState`], or null if `path` is null, not UTF-8
/// or the environment cannot be opened. Release it with [`close_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(path: *const c_char) -> *mut AppDbState {
    if path.is_null() {
        warn!("Null path pointer passed to create_store");
        return std::ptr::null_mut();
    }

    let path_str = match unsafe { CStr::from_ptr(path).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in path parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let mut config = StoreConfig::default().with_env_overrides();
    config.data_dir = path_str.into();
    open_state(&config)
}

/// Opens the store described by a JSON [`StoreConfig`].
///
/// # Returns
///
/// A pointer to the [`AppDbState`], or null on invalid input or if the
/// environment cannot be opened.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store_with_config(config_json: *const c_char) -> *mut AppDbState {
    if config_json.is_null() {
        warn!("Null config pointer passed to create_store_with_config");
        return std::ptr::null_mut();
    }

    let json = match unsafe { CStr::from_ptr(config_json).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in config parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    match StoreConfig::from_json_str(json) {
        Ok(config) => open_state(&config.with_env_overrides()),
        Err(e) => {
            warn!("{e}");
            std::ptr::null_mut()
        }
    }
}

fn open_state(config: &StoreConfig) -> *mut AppDbState {
    match AppDbState::init(config) {
        Ok(state) => {
            info!("✅ Store initialized at {}", config.data_dir.display());
            Box::into_raw(Box::new(state))
        }
        Err(e) => {
            warn!("❌ Failed to initialize store at {}: {e}", config.data_dir.display());
            std::ptr::null_mut()
        }
    }
}

/// Every document of `collection`, as a JSON array inside `Ok`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn collection_get_all(state: *mut AppDbState, collection: *const c_char) -> *const c_char {
    let state = match state_ref(state, "collection_get_all") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let name = match c_ptr_to_string(collection, "collection") {
        Ok(name) => name,
        Err(err) => return err,
    };

    json_response(&state.collection(&name).get_all())
}

/// The document with `id` in `collection`, or `NotFound`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn collection_get_by_id(
    state: *mut AppDbState,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "collection_get_by_id") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let (name, id_str) = match (c_ptr_to_string(collection, "collection"), c_ptr_to_string(id, "id")) {
        (Ok(name), Ok(id)) => (name, id),
        (Err(err), _) | (_, Err(err)) => return err,
    };

    match state.collection(&name).get_by_id(&id_str) {
        Some(doc) => json_response(&doc),
        None => response_to_c_string(&AppResponse::NotFound(format!(
            "No document found with id: {id_str}"
        ))),
    }
}

/// Appends the JSON object `json_ptr` to `collection`.
///
/// A document without an `id` is given a fresh one along with
/// `createdAt`/`updatedAt`; the stored document is returned.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn collection_add(
    state: *mut AppDbState,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "collection_add") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let name = match c_ptr_to_string(collection, "collection") {
        Ok(name) => name,
        Err(err) => return err,
    };
    let doc = match c_ptr_to_document(json_ptr) {
        Ok(doc) => doc,
        Err(err) => return err,
    };

    let store = state.collection(&name);
    let stored = if doc.id().is_some() {
        let stored = doc.clone();
        store.add(doc).then_some(stored)
    } else {
        store.insert_new(doc, None)
    };

    match stored {
        Some(doc) => json_response(&doc),
        None => response_to_c_string(&AppResponse::StorageUnavailable(format!(
            "Failed to save document to {}",
            store.name()
        ))),
    }
}

/// Shallow-merges the JSON object `patch_ptr` onto document `id`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn collection_update(
    state: *mut AppDbState,
    collection: *const c_char,
    id: *const c_char,
    patch_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "collection_update") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let (name, id_str) = match (c_ptr_to_string(collection, "collection"), c_ptr_to_string(id, "id")) {
        (Ok(name), Ok(id)) => (name, id),
        (Err(err), _) | (_, Err(err)) => return err,
    };
    let patch = match c_ptr_to_document(patch_ptr) {
        Ok(doc) => doc,
        Err(err) => return err,
    };

    let store = state.collection(&name);
    if store.update(&id_str, &patch) {
        match store.get_by_id(&id_str) {
            Some(doc) => json_response(&doc),
            None => response_to_c_string(&AppResponse::success("Document updated")),
        }
    } else {
        response_to_c_string(&not_found_or_unwritten(&store, &id_str))
    }
}

/// Removes document `id` from `collection`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn collection_delete(
    state: *mut AppDbState,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "collection_delete") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let (name, id_str) = match (c_ptr_to_string(collection, "collection"), c_ptr_to_string(id, "id")) {
        (Ok(name), Ok(id)) => (name, id),
        (Err(err), _) | (_, Err(err)) => return err,
    };

    let store = state.collection(&name);
    if store.delete(&id_str) {
        response_to_c_string(&AppResponse::success("Document deleted successfully"))
    } else {
        response_to_c_string(&not_found_or_unwritten(&store, &id_str))
    }
}

/// Documents of `collection` matching the JSON [`Filter`] `filter_ptr`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn collection_query(
    state: *mut AppDbState,
    collection: *const c_char,
    filter_ptr: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "collection_query") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let (name, filter_json) = match (
        c_ptr_to_string(collection, "collection"),
        c_ptr_to_string(filter_ptr, "filter"),
    ) {
        (Ok(name), Ok(filter)) => (name, filter),
        (Err(err), _) | (_, Err(err)) => return err,
    };

    let filter: Filter = match serde_json::from_str(&filter_json) {
        Ok(f) => f,
        Err(e) => {
            return response_to_c_string(&AppResponse::BadRequest(format!("Invalid filter: {e}")))
        }
    };

    json_response(&state.collection(&name).find(&filter))
}

/// Reconciled orders of `email`, as `{"orders": [...], "total": n}` inside
/// `Ok`.
///
/// `sources_json` is an optional JSON array of collection names searched
/// in that order; when null the configured sources are used.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn find_orders_by_email(
    state: *mut AppDbState,
    email: *const c_char,
    sources_json: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "find_orders_by_email") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let email_str = match c_ptr_to_string(email, "email") {
        Ok(email) => email,
        Err(err) => return err,
    };
    if email_str.trim().is_empty() {
        return response_to_c_string(&AppResponse::BadRequest("Email is required".to_string()));
    }

    if sources_json.is_null() {
        return json_response(&state.find_orders_by_email(&email_str));
    }
    let sources = match c_ptr_to_string(sources_json, "sources") {
        Ok(json) => match serde_json::from_str::<Vec<String>>(&json) {
            Ok(sources) => sources,
            Err(e) => {
                return response_to_c_string(&AppResponse::BadRequest(format!(
                    "Invalid sources, expected a JSON array of names: {e}"
                )))
            }
        },
        Err(err) => return err,
    };

    json_response(&state.reconciler().find_orders_by_email(&email_str, sources.as_slice()))
}

/// Releases a string returned by any function of this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

/// Releases the store. The pointer must not be used afterwards.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut AppDbState) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_store".to_string());
        return response_to_c_string(&error);
    }

    drop(unsafe { Box::from_raw(state) });
    info!("Store closed");
    response_to_c_string(&AppResponse::success("Store closed successfully"))
}

/// Distinguishes a missing id from a write that did not land.
fn not_found_or_unwritten(store: &DocumentStore, id: &str) -> AppResponse {
    if store.get_by_id(id).is_none() {
        AppResponse::NotFound(format!("No document found with id: {id}"))
    } else {
        AppResponse::StorageUnavailable(format!("Failed to save {}", store.name()))
    }
}

fn state_ref<'a>(state: *mut AppDbState, caller: &str) -> Result<&'a AppDbState, *const c_char> {
    match unsafe { state.as_ref() } {
        Some(s) => Ok(s),
        None => Err(response_to_c_string(&AppResponse::BadRequest(format!(
            "Null state pointer passed to {caller}"
        )))),
    }
}

/// Serializes `value` into an `Ok` response.
fn json_response<T: serde::Serialize + ?Sized>(value: &T) -> *const c_char {
    match serde_json::to_string(value) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&AppResponse::MalformedDocument(format!(
            "Failed to serialize result: {e}"
        ))),
    }
}

/// Converts an [`AppResponse`] to a C string owned by the caller, who
/// releases it with [`free_response`]. Null if serialization fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust String, or to a ready-made
/// `BadRequest` response.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn c_ptr_to_document(ptr: *const c_char) -> Result<Document, *const c_char> {
    let json = c_ptr_to_string(ptr, "JSON")?;
    serde_json::from_str::<serde_json::Value>(&json)
        .map_err(|e| AppResponse::BadRequest(format!("Invalid JSON: {e}")))
        .and_then(Document::try_from)
        .map_err(|e| response_to_c_string(&e))
}
