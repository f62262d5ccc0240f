//! Canonical order shapes.
//!
//! Historical order records were written under several schemas. These
//! types are the single shape the reconciliation engine rebuilds them into.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

/// Status assigned to a reconciled order that carries none.
pub const DEFAULT_ORDER_STATUS: &str = "processing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub price: f64,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// An order after reconciliation.
///
/// `email` is always lower-case and trimmed, whichever legacy location it
/// was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: String,
    pub created_at: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

/// Result of an orders-by-email lookup. `total` counts every match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrdersLookup {
    pub orders: Vec<Order>,
    pub total: usize,
}

impl OrdersLookup {
    pub fn new(orders: Vec<Order>) -> Self {
        let total = orders.len();
        Self { orders, total }
    }
}

/// Lifecycle states an order may be moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether reaching this status counts the order's items as sold.
    pub fn counts_as_sale(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppResponse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = OrderStatus::ALL.iter().map(OrderStatus::as_str).collect();
                AppResponse::ValidationFailure(format!(
                    "Invalid status '{s}'. Must be one of {valid:?}"
                ))
            })
    }
}

/// Count of stored orders per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub shipped: usize,
    pub delivered: usize,
    pub cancelled: usize,
}

impl StatusSummary {
    /// Counts one order. Unknown statuses only count toward `total`.
    pub fn record(&mut self, status: Option<&str>) {
        self.total += 1;
        match status.and_then(|s| s.parse::<OrderStatus>().ok()) {
            Some(OrderStatus::Pending) => self.pending += 1,
            Some(OrderStatus::Processing) => self.processing += 1,
            Some(OrderStatus::Shipped) => self.shipped += 1,
            Some(OrderStatus::Delivered) => self.delivered += 1,
            Some(OrderStatus::Cancelled) => self.cancelled += 1,
            None => {}
        }
    }
}
