//! Domain collections.
//!
//! Thin wrappers over [`DocumentStore`] adding the lookups each part of the
//! storefront needs. Every lookup is a full scan of `get_all()` at call
//! time; nothing is cached or indexed.

use std::ops::Deref;

use serde_json::{json, Value as JsonValue};

use crate::collection::DocumentStore;
use crate::document::Document;
use crate::filter::Filter;
use crate::identity::get_timestamp;
use crate::listing::{newest_page, sort_newest_first, Page};
use crate::order_model::{OrderStatus, StatusSummary};

macro_rules! typed_collection {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            store: DocumentStore,
        }

        impl $name {
            pub fn new(store: DocumentStore) -> Self {
                Self { store }
            }

            pub fn store(&self) -> &DocumentStore {
                &self.store
            }
        }

        impl Deref for $name {
            type Target = DocumentStore;

            fn deref(&self) -> &DocumentStore {
                &self.store
            }
        }
    };
}

typed_collection!(
    /// Registered customers, suppliers and admins.
    UserCollection
);
typed_collection!(
    /// Saved shipping addresses.
    AddressCollection
);
typed_collection!(
    /// Orders in the current schema, keyed by shipping email.
    OrderCollection
);
typed_collection!(
    /// Catalog products.
    ProductCollection
);
typed_collection!(
    /// Product reviews.
    ReviewCollection
);
typed_collection!(
    /// Saved shopping carts.
    CartCollection
);

impl UserCollection {
    /// First user whose email matches, ignoring case.
    ///
    /// Email is assumed unique but not enforced; later duplicates are
    /// unreachable through this lookup.
    pub fn get_by_email(&self, email: &str) -> Option<Document> {
        let filter = Filter::eq_ignore_case("email", email);
        self.get_all().into_iter().find(|user| filter.matches(user))
    }
}

impl AddressCollection {
    pub fn get_by_user_id(&self, user_id: &str) -> Vec<Document> {
        self.query_by_field("user_id", &json!(user_id))
    }

    /// First address of the user flagged `is_default = true`.
    pub fn get_default_for_user(&self, user_id: &str) -> Option<Document> {
        let filter = Filter::and(vec![
            Filter::eq("user_id", user_id),
            Filter::eq("is_default", true),
        ]);
        self.get_all().into_iter().find(|address| filter.matches(address))
    }
}

impl OrderCollection {
    /// Orders placed by a user. Matches the current `userId` field and the
    /// legacy `user_id` one.
    pub fn get_by_user_id(&self, user_id: &str) -> Vec<Document> {
        self.find(&Filter::or(vec![
            Filter::eq("userId", user_id),
            Filter::eq("user_id", user_id),
        ]))
    }

    /// Orders whose shipping email matches, ignoring case.
    ///
    /// Only the current schema is consulted; use the
    /// [`ReconciliationEngine`](crate::reconcile::ReconciliationEngine) to
    /// search legacy layouts and backup locations.
    pub fn get_by_email(&self, email: &str) -> Vec<Document> {
        self.find(&Filter::eq_ignore_case("shippingInfo.email", email))
    }

    pub fn get_by_status(&self, status: &str) -> Vec<Document> {
        self.query_by_field("status", &json!(status))
    }

    pub fn status_summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for order in self.get_all() {
            summary.record(order.str_field("status"));
        }
        summary
    }

    /// Newest-first page of orders, optionally restricted to one status.
    pub fn list(&self, status: Option<&str>, page: usize, limit: usize) -> Page {
        let orders = match status {
            Some(status) => self.get_by_status(status),
            None => self.get_all(),
        };
        newest_page(orders, page, limit)
    }

    /// Moves an order to `status`, stamping `updatedAt` and, when given,
    /// replacing `notes`.
    pub fn set_status(&self, id: &str, status: OrderStatus, notes: Option<&str>) -> bool {
        let mut patch = Document::new();
        patch.insert("status", status.as_str());
        patch.insert("updatedAt", get_timestamp());
        if let Some(notes) = notes.filter(|n| !n.is_empty()) {
            patch.insert("notes", notes);
        }
        self.update(id, &patch)
    }
}

impl ProductCollection {
    pub fn get_by_category(&self, category: &str) -> Vec<Document> {
        self.query_by_field("category", &json!(category))
    }

    /// Products whose name or description contains `text`, ignoring case.
    pub fn search(&self, text: &str) -> Vec<Document> {
        self.find(&Filter::or(vec![
            Filter::contains("name", text),
            Filter::contains("description", text),
        ]))
    }

    /// Adds `quantity` to the product's `soldCount`.
    ///
    /// The increment happens inside one locked read-modify-write, so
    /// concurrent sales of the same product are all counted.
    pub fn add_sold_quantity(&self, product_id: &str, quantity: i64) -> bool {
        if quantity <= 0 {
            return false;
        }
        self.modify_by_id(product_id, |product| {
            let current = product.get("soldCount").and_then(JsonValue::as_i64).unwrap_or(0);
            product.insert("soldCount", current + quantity);
            product.insert("updatedAt", get_timestamp());
        })
    }
}

/// Read hook of the products collection: `images` always reads as an array
/// of non-empty entries.
pub fn normalize_product_images(product: &mut Document) {
    let Some(images) = product.get("images") else {
        return;
    };
    let cleaned: Vec<JsonValue> = match images {
        JsonValue::Array(entries) => entries
            .iter()
            .filter(|img| match img {
                JsonValue::Null => false,
                JsonValue::String(s) => !s.is_empty(),
                _ => true,
            })
            .cloned()
            .collect(),
        _ => Vec::new(),
    };
    product.insert("images", cleaned);
}

impl ReviewCollection {
    /// Reviews of a product, newest first.
    pub fn get_by_product_id(&self, product_id: &str) -> Vec<Document> {
        let mut reviews = self.query_by_field("productId", &json!(product_id));
        sort_newest_first(&mut reviews);
        reviews
    }

    /// Reviews written by a user, newest first.
    pub fn get_by_user_id(&self, user_id: &str) -> Vec<Document> {
        let mut reviews = self.query_by_field("userId", &json!(user_id));
        sort_newest_first(&mut reviews);
        reviews
    }
}

impl CartCollection {
    pub fn get_by_user_id(&self, user_id: &str) -> Vec<Document> {
        self.query_by_field("userId", &json!(user_id))
    }
}
