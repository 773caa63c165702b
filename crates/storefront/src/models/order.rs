//! Orders and their line items.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use respace_core::{
    Email, Krw, OrderId, OrderNumber, OrderStatus, ProductId, StoredStatus, UserId,
};

use super::payment::PaymentSummary;

/// Buyer contact details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
}

/// A line item with its price captured from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Krw,
    pub line_total: Krw,
}

/// An order ready to insert. `total` equals the sum of `line_total`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer: Customer,
    pub user_id: Option<UserId>,
    pub guest_token: Option<Uuid>,
    pub is_cart: bool,
    pub total: Krw,
    pub lines: Vec<NewOrderLine>,
}

/// An order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: StoredStatus<OrderStatus>,
    pub total_price_krw: i64,
    pub currency: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub user_id: Option<UserId>,
    #[serde(skip_serializing)]
    pub guest_token: Option<Uuid>,
    pub is_cart: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response body for a newly created order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderCreated {
    pub id: OrderId,
    pub order_number: String,
    pub status: StoredStatus<OrderStatus>,
    pub total_price_krw: i64,
    pub guest_token: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderCreated {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            total_price_krw: order.total_price_krw,
            guest_token: order.guest_token,
            created_at: order.created_at,
        }
    }
}

/// A stored line item joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price_krw: i64,
    #[serde(rename = "total_price_krw")]
    pub line_total_krw: i64,
}

/// Order with lines and payment attempts, as shown on the lookup page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
    pub payments: Vec<PaymentSummary>,
}
