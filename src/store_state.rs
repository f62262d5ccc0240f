use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::blob_store::{BlobStore, MemoryBlobStore};
use crate::collection::{sanitize_key, DocumentStore};
use crate::collections::{
    normalize_product_images, AddressCollection, CartCollection, OrderCollection, ProductCollection,
    ReviewCollection, UserCollection,
};
use crate::config::StoreConfig;
use crate::lmdb_store::LmdbBlobStore;
use crate::locks::LockRegistry;
use crate::order_model::{OrderStatus, OrdersLookup};
use crate::reconcile::{ReconcileConfig, ReconciliationEngine};

/// Key under which [`AppDbState::write_export`] stores its snapshot.
pub const EXPORT_KEY: &str = "migration_export.json";

/// Collections included in a data export.
pub const EXPORTED_COLLECTIONS: [&str; 5] = ["users", "products", "orders", "addresses", "carts"];

/// Process-lifetime handle on the document store.
///
/// Built once at startup and passed to whatever serves requests. It owns
/// the storage backend and the per-collection lock registry, so every
/// collection handle it gives out serializes writers on the same lock.
pub struct AppDbState {
    backend: Arc<dyn BlobStore>,
    locks: LockRegistry,
    reconcile: ReconcileConfig,
}

impl AppDbState {
    /// Opens the LMDB environment described by `config`.
    pub fn init(config: &StoreConfig) -> Result<Self, AppResponse> {
        let backend = LmdbBlobStore::open(&config.data_dir, config.map_size_bytes())?;
        info!("Store opened at {}", config.data_dir.display());
        Ok(Self::with_backend(Arc::new(backend), config.reconcile.clone()))
    }

    /// Volatile store, nothing survives the process.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBlobStore::new()), ReconcileConfig::default())
    }

    pub fn with_backend(backend: Arc<dyn BlobStore>, reconcile: ReconcileConfig) -> Self {
        Self {
            backend,
            locks: LockRegistry::new(),
            reconcile,
        }
    }

    /// Handle on any collection by name.
    pub fn collection(&self, name: &str) -> DocumentStore {
        let key = sanitize_key(name);
        let lock = self.locks.lock_for(&key);
        let store = DocumentStore::new(&key, Arc::clone(&self.backend), lock);
        if key == "products" {
            store.with_read_hook(normalize_product_images)
        } else {
            store
        }
    }

    pub fn users(&self) -> UserCollection {
        UserCollection::new(self.collection("users"))
    }

    pub fn addresses(&self) -> AddressCollection {
        AddressCollection::new(self.collection("addresses"))
    }

    pub fn orders(&self) -> OrderCollection {
        OrderCollection::new(self.collection("orders"))
    }

    pub fn products(&self) -> ProductCollection {
        ProductCollection::new(self.collection("products"))
    }

    pub fn reviews(&self) -> ReviewCollection {
        ReviewCollection::new(self.collection("reviews"))
    }

    pub fn carts(&self) -> CartCollection {
        CartCollection::new(self.collection("carts"))
    }

    /// Reconciliation engine using the configured sources and precedence.
    pub fn reconciler(&self) -> ReconciliationEngine {
        self.reconciler_with(self.reconcile.clone())
    }

    pub fn reconciler_with(&self, config: ReconcileConfig) -> ReconciliationEngine {
        ReconciliationEngine::new(Arc::clone(&self.backend), config)
    }

    /// Every order for `email` across the configured storage locations.
    pub fn find_orders_by_email(&self, email: &str) -> OrdersLookup {
        self.reconciler().find_in_configured_sources(email)
    }

    /// Moves an order to `status` and, when the order is thereby
    /// delivered, adds each item's quantity to its product's `soldCount`.
    ///
    /// The two collections are written one after the other; a failure
    /// between the writes leaves the order updated and the counts not.
    /// Returns false when the order does not exist or was not written.
    pub fn update_order_status(&self, order_id: &str, status: OrderStatus, notes: Option<&str>) -> bool {
        let orders = self.orders();
        if !orders.set_status(order_id, status, notes) {
            return false;
        }
        if !status.counts_as_sale() {
            return true;
        }

        let Some(order) = orders.get_by_id(order_id) else {
            warn!("Order {order_id} vanished before sold counts were updated");
            return true;
        };
        let products = self.products();
        let items = order.get("items").and_then(JsonValue::as_array).cloned().unwrap_or_default();
        for item in &items {
            let Some(product_id) = item.get("id").and_then(JsonValue::as_str) else {
                continue;
            };
            let quantity = item.get("quantity").and_then(JsonValue::as_i64).unwrap_or(0);
            if quantity > 0 && !products.add_sold_quantity(product_id, quantity) {
                warn!("Sold count of product {product_id} not updated for order {order_id}");
            }
        }
        true
    }

    /// Snapshot of the named collections, `{name: [documents]}`.
    pub fn export_collections<S: AsRef<str>>(&self, names: &[S]) -> BTreeMap<String, JsonValue> {
        names
            .iter()
            .map(|name| {
                let store = self.collection(name.as_ref());
                let docs = store.get_all();
                info!("Exported {} items from {}", docs.len(), store.name());
                let values = docs.into_iter().map(JsonValue::from).collect();
                (store.name().to_string(), JsonValue::Array(values))
            })
            .collect()
    }

    /// Stores an export of the named collections under [`EXPORT_KEY`].
    pub fn write_export<S: AsRef<str>>(&self, names: &[S]) -> Result<(), AppResponse> {
        let snapshot = self.export_collections(names);
        let text = serde_json::to_string_pretty(&snapshot)?;
        self.backend.write(EXPORT_KEY, &text)?;
        info!("Data exported to {EXPORT_KEY}");
        Ok(())
    }

    /// Names of every stored blob.
    pub fn collection_names(&self) -> Result<Vec<String>, AppResponse> {
        self.backend.keys()
    }

    /// Removes a collection's blob entirely. Returns true if it existed.
    pub fn drop_collection(&self, name: &str) -> Result<bool, AppResponse> {
        let key = sanitize_key(name);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.acquire();
        self.backend.remove(&key)
    }
}
