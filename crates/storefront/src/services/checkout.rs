//! Checkout: order creation, payment preparation, completion and lookup.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use respace_core::reconcile::ReconcileOutcome;
use respace_core::{
    CurrencyCode, Email, Krw, OrderId, OrderNumber, OrderStatus, PayMethod, ProductId, UserId,
};

use super::reconciliation::{ReconcileError, ReconciliationEngine};
use super::validation::{self, REQUIRED, ValidationErrors};
use crate::config::PortOneConfig;
use crate::db::{RepositoryError, Store};
use crate::models::{
    Customer, NewOrder, NewOrderLine, NewPayment, OrderCreated, OrderDetail, PaymentSummary,
    Product,
};

const MAX_NAME_LEN: usize = 80;
const MAX_PHONE_LEN: usize = 30;
const MAX_QUANTITY: i64 = 999;
const MAX_CART_ITEMS: usize = 50;
const MAX_PAYMENT_ID_LEN: usize = 128;

/// Attempts at a fresh order number before giving up.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

const PAY_METHODS: [PayMethod; 3] = [
    PayMethod::Card,
    PayMethod::Transfer,
    PayMethod::VirtualAccount,
];

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid input: {0}")]
    Validation(ValidationErrors),

    /// A requested product does not exist or is not for sale.
    #[error("product not found")]
    ProductNotFound,

    #[error("order not found")]
    OrderNotFound,

    /// Payments are not configured.
    #[error("payments not configured")]
    NotReady,

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ValidationErrors> for CheckoutError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// `POST /api/orders` body.
///
/// Either a single `productId` (defaulting to the active product) with a
/// `quantity`, or a cart of `items`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub items: Option<Vec<OrderItemRequest>>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub user_id: Option<String>,
}

/// One cart entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
}

/// `POST /api/payments/portone/prepare` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    pub order_id: Option<String>,
    pub pay_method: Option<String>,
}

/// `POST /api/payments/portone/complete` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
}

/// `POST /api/orders/lookup` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub order_number: Option<String>,
    pub email: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// A prepared payment: the id to complete with and the browser SDK request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedPayment {
    pub payment_id: String,
    pub request: PaymentRequest,
}

/// Arguments for the `PortOne` browser SDK's `requestPayment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub store_id: String,
    pub channel_key: String,
    pub payment_id: String,
    pub order_name: String,
    pub total_amount: i64,
    pub currency: &'static str,
    pub pay_method: PayMethod,
    pub customer: PaymentCustomer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCustomer {
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

// =============================================================================
// Validated input
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    /// One product, or the active product when `None`.
    Single {
        product_id: Option<ProductId>,
        quantity: i32,
    },
    /// Distinct products with merged quantities, in first-seen order.
    Cart(Vec<(ProductId, i32)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidOrder {
    selection: Selection,
    customer: Customer,
    user_id: Option<UserId>,
}

impl CreateOrderRequest {
    fn validate(&self) -> Result<ValidOrder, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = validation::required_text(
            &mut errors,
            "customerName",
            self.customer_name.as_deref(),
            MAX_NAME_LEN,
        );
        let email = parse_email(&mut errors, "customerEmail", self.customer_email.as_deref());
        let phone = validation::optional_text(
            &mut errors,
            "customerPhone",
            self.customer_phone.as_deref(),
            MAX_PHONE_LEN,
        );
        let user_id = self
            .user_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| parse_uuid(&mut errors, "userId", v).map(UserId::new));

        let selection = match &self.items {
            Some(_) if self.product_id.is_some() => {
                errors.add_form("Provide either productId or items, not both");
                None
            }
            Some(items) => validate_items(&mut errors, items).map(Selection::Cart),
            None => {
                let product_id = self
                    .product_id
                    .as_deref()
                    .and_then(|v| parse_uuid(&mut errors, "productId", v).map(ProductId::new));
                validation::quantity(&mut errors, "quantity", self.quantity, MAX_QUANTITY).map(
                    |quantity| Selection::Single {
                        product_id,
                        quantity,
                    },
                )
            }
        };

        match (name, email, selection) {
            (Some(name), Some(email), Some(selection)) if errors.is_empty() => Ok(ValidOrder {
                selection,
                customer: Customer { name, email, phone },
                user_id,
            }),
            _ => Err(errors),
        }
    }
}

fn validate_items(
    errors: &mut ValidationErrors,
    items: &[OrderItemRequest],
) -> Option<Vec<(ProductId, i32)>> {
    if items.is_empty() || items.len() > MAX_CART_ITEMS {
        errors.add("items", format!("Must contain between 1 and {MAX_CART_ITEMS} items"));
        return None;
    }

    let mut merged: Vec<(ProductId, i64)> = Vec::with_capacity(items.len());
    let mut index: HashMap<ProductId, usize> = HashMap::new();
    let mut valid = true;

    for item in items {
        let Some(raw_id) = item.product_id.as_deref() else {
            errors.add("items", "productId: Required");
            valid = false;
            continue;
        };
        let Some(id) = parse_uuid(errors, "items", raw_id).map(ProductId::new) else {
            valid = false;
            continue;
        };
        let Some(quantity) = validation::quantity(errors, "items", item.quantity, MAX_QUANTITY)
        else {
            valid = false;
            continue;
        };

        match index.get(&id).and_then(|&i| merged.get_mut(i)) {
            Some(entry) => entry.1 += i64::from(quantity),
            None => {
                index.insert(id, merged.len());
                merged.push((id, i64::from(quantity)));
            }
        }
    }

    if !valid {
        return None;
    }

    let mut lines = Vec::with_capacity(merged.len());
    for (id, quantity) in merged {
        let quantity = validation::quantity(errors, "items", Some(quantity), MAX_QUANTITY)?;
        lines.push((id, quantity));
    }
    Some(lines)
}

fn parse_email(errors: &mut ValidationErrors, field: &str, value: Option<&str>) -> Option<Email> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        errors.add(field, REQUIRED);
        return None;
    };
    match Email::parse(value) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.add(field, "Invalid email");
            None
        }
    }
}

fn parse_uuid(errors: &mut ValidationErrors, field: &str, value: &str) -> Option<Uuid> {
    match Uuid::parse_str(value.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, "Invalid uuid");
            None
        }
    }
}

fn required_uuid(errors: &mut ValidationErrors, field: &str, value: Option<&str>) -> Option<Uuid> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => parse_uuid(errors, field, v),
        None => {
            errors.add(field, REQUIRED);
            None
        }
    }
}

fn parse_pay_method(errors: &mut ValidationErrors, value: Option<&str>) -> Option<PayMethod> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Some(PayMethod::default());
    };
    let method = PAY_METHODS.into_iter().find(|m| m.as_str() == value);
    if method.is_none() {
        errors.add("payMethod", "Must be one of CARD, TRANSFER, VIRTUAL_ACCOUNT");
    }
    method
}

/// The name shown on the payment sheet: the first line, plus a count of the rest.
fn order_name(first: &str, line_count: usize) -> String {
    match line_count {
        0 | 1 => first.to_owned(),
        n => format!("{first} 외 {}건", n - 1),
    }
}

fn price_lines(
    selection: &[(ProductId, i32)],
    products: &[Product],
) -> Result<(Vec<NewOrderLine>, Krw), CheckoutError> {
    let mut lines = Vec::with_capacity(selection.len());
    let mut total = Krw::ZERO;

    for &(product_id, quantity) in selection {
        let product = products
            .iter()
            .find(|p| p.id == product_id && p.is_active)
            .ok_or(CheckoutError::ProductNotFound)?;

        let unit_price = Krw::new(product.price_krw);
        let too_large = || ValidationErrors::field("quantity", "Order total is too large");
        let line_total = unit_price
            .checked_mul(i64::from(quantity))
            .ok_or_else(too_large)?;
        total = total.checked_add(line_total).ok_or_else(too_large)?;

        lines.push(NewOrderLine {
            product_id,
            product_name: product.name.clone(),
            quantity,
            unit_price,
            line_total,
        });
    }

    Ok((lines, total))
}

// =============================================================================
// Service
// =============================================================================

/// Checkout service.
pub struct CheckoutService<'a> {
    store: &'a dyn Store,
    portone: Option<&'a PortOneConfig>,
    engine: &'a ReconciliationEngine,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn Store,
        portone: Option<&'a PortOneConfig>,
        engine: &'a ReconciliationEngine,
    ) -> Self {
        Self {
            store,
            portone,
            engine,
        }
    }

    /// The oldest active product.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductNotFound` if nothing is for sale.
    pub async fn active_product(&self) -> Result<Product, CheckoutError> {
        self.store
            .active_product()
            .await?
            .ok_or(CheckoutError::ProductNotFound)
    }

    /// Create a `pending` order with prices captured from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for bad input or an overflowing
    /// total, and `CheckoutError::ProductNotFound` if any product is missing
    /// or inactive.
    #[instrument(skip(self, request), fields(cart = request.items.is_some()))]
    pub async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderCreated, CheckoutError> {
        let order = request.validate()?;

        let (selection, is_cart) = match order.selection {
            Selection::Single {
                product_id: None,
                quantity,
            } => {
                let product = self.active_product().await?;
                (vec![(product.id, quantity)], false)
            }
            Selection::Single {
                product_id: Some(id),
                quantity,
            } => (vec![(id, quantity)], false),
            Selection::Cart(lines) => (lines, true),
        };

        let ids: Vec<ProductId> = selection.iter().map(|(id, _)| *id).collect();
        let products = self.store.products_by_ids(&ids).await?;
        let (lines, total) = price_lines(&selection, &products)?;

        let guest_token = order.user_id.is_none().then(Uuid::new_v4);

        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let new_order = NewOrder {
                order_number: OrderNumber::new(Utc::now().date_naive(), rand::random()),
                customer: order.customer.clone(),
                user_id: order.user_id,
                guest_token,
                is_cart,
                total,
                lines: lines.clone(),
            };

            match self.store.insert_order(&new_order).await {
                Ok(created) => {
                    info!(
                        order_id = %created.id,
                        order_number = %created.order_number,
                        total_krw = created.total_price_krw,
                        "Order created"
                    );
                    return Ok(created.into());
                }
                Err(RepositoryError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    warn!(attempt, "Order number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::Conflict("order number already exists".to_string()).into())
    }

    /// Create a payment attempt for a pending order and describe it for the browser SDK.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotReady` without `PortOne` configuration,
    /// `CheckoutError::OrderNotFound` for an unknown order and
    /// `CheckoutError::Validation` for bad input or an order not awaiting payment.
    #[instrument(skip(self, request))]
    pub async fn prepare_checkout(
        &self,
        request: &PrepareRequest,
    ) -> Result<PreparedPayment, CheckoutError> {
        let mut errors = ValidationErrors::new();
        let order_id = required_uuid(&mut errors, "orderId", request.order_id.as_deref());
        let pay_method = parse_pay_method(&mut errors, request.pay_method.as_deref());
        let (Some(order_id), Some(pay_method)) = (order_id, pay_method) else {
            return Err(errors.into());
        };
        let order_id = OrderId::new(order_id);

        let portone = self.portone.ok_or(CheckoutError::NotReady)?;

        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        if order.status.known() != Some(OrderStatus::Pending) {
            return Err(ValidationErrors::form(format!(
                "Order is {}, not awaiting payment",
                order.status
            ))
            .into());
        }

        let lines = self.store.order_lines(order_id).await?;
        let first = lines
            .first()
            .map_or_else(|| order.order_number.clone(), |l| l.product_name.clone());

        let payment_id = format!("pay-{}", Uuid::new_v4().simple());
        self.store
            .insert_payment(&NewPayment {
                payment_id: payment_id.clone(),
                order_id,
                amount: Krw::new(order.total_price_krw),
                pay_method,
            })
            .await?;

        info!(
            order_id = %order_id,
            payment_id = %payment_id,
            pay_method = %pay_method,
            "Payment prepared"
        );

        Ok(PreparedPayment {
            payment_id: payment_id.clone(),
            request: PaymentRequest {
                store_id: portone.store_id.clone(),
                channel_key: portone.channel_keys.for_method(pay_method).to_owned(),
                payment_id,
                order_name: order_name(&first, lines.len()),
                total_amount: order.total_price_krw,
                currency: CurrencyCode::KRW.gateway_code(),
                pay_method,
                customer: PaymentCustomer {
                    full_name: order.customer_name,
                    email: order.customer_email,
                    phone_number: order.customer_phone,
                },
            },
        })
    }

    /// Reconcile a payment the buyer's browser reports as finished.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for bad input, including a payment
    /// that belongs to a different order, and `CheckoutError::Reconcile` for
    /// every reconciliation failure.
    #[instrument(skip(self, request))]
    pub async fn complete_checkout(
        &self,
        request: &CompleteRequest,
    ) -> Result<ReconcileOutcome, CheckoutError> {
        let mut errors = ValidationErrors::new();
        let payment_id = validation::required_text(
            &mut errors,
            "paymentId",
            request.payment_id.as_deref(),
            MAX_PAYMENT_ID_LEN,
        );
        let order_id = required_uuid(&mut errors, "orderId", request.order_id.as_deref());
        let (Some(payment_id), Some(order_id)) = (payment_id, order_id) else {
            return Err(errors.into());
        };
        let order_id = OrderId::new(order_id);

        if let Some(payment) = self.store.find_payment(&payment_id).await?
            && payment.order_id != order_id
        {
            return Err(
                ValidationErrors::field("paymentId", "Payment belongs to another order").into(),
            );
        }

        Ok(self
            .engine
            .sync_payment_from_portone(&payment_id, Some(order_id))
            .await?)
    }

    /// Find an order by number and buyer email.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` unless both match.
    #[instrument(skip(self, request))]
    pub async fn lookup_order(&self, request: &LookupRequest) -> Result<OrderDetail, CheckoutError> {
        let mut errors = ValidationErrors::new();
        let number = match request.order_number.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(v) => OrderNumber::parse(v)
                .map_err(|e| errors.add("orderNumber", e.to_string()))
                .ok(),
            None => {
                errors.add("orderNumber", REQUIRED);
                None
            }
        };
        let email = parse_email(&mut errors, "email", request.email.as_deref());
        let (Some(number), Some(email)) = (number, email) else {
            return Err(errors.into());
        };

        let order = self
            .store
            .find_order_by_number(&number, &email)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        let items = self.store.order_lines(order.id).await?;
        let payments = self
            .store
            .payments_for_order(order.id)
            .await?
            .iter()
            .map(PaymentSummary::from)
            .collect();

        Ok(OrderDetail {
            order,
            items,
            payments,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: Some("Kim Minji".to_owned()),
            customer_email: Some("Minji@Example.com".to_owned()),
            customer_phone: Some(String::new()),
            ..CreateOrderRequest::default()
        }
    }

    #[test]
    fn test_single_defaults() {
        let order = request().validate().unwrap();
        assert_eq!(
            order.selection,
            Selection::Single {
                product_id: None,
                quantity: 1
            }
        );
        assert_eq!(order.customer.email.as_str(), "minji@example.com");
        assert_eq!(order.customer.phone, None);
        assert_eq!(order.user_id, None);
    }

    #[test]
    fn test_missing_fields_collected() {
        let errors = CreateOrderRequest::default().validate().unwrap_err();
        assert!(errors.field_errors.contains_key("customerName"));
        assert!(errors.field_errors.contains_key("customerEmail"));
    }

    #[test]
    fn test_bad_ids_and_quantity() {
        let errors = CreateOrderRequest {
            product_id: Some("not-a-uuid".to_owned()),
            user_id: Some("nope".to_owned()),
            quantity: Some(1000),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert!(errors.field_errors.contains_key("productId"));
        assert!(errors.field_errors.contains_key("userId"));
        assert!(errors.field_errors.contains_key("quantity"));
    }

    #[test]
    fn test_cart_merges_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let item = |id: Uuid, quantity| OrderItemRequest {
            product_id: Some(id.to_string()),
            quantity: Some(quantity),
        };
        let order = CreateOrderRequest {
            items: Some(vec![item(a, 2), item(b, 1), item(a, 3)]),
            ..request()
        }
        .validate()
        .unwrap();
        assert_eq!(
            order.selection,
            Selection::Cart(vec![(ProductId::new(a), 5), (ProductId::new(b), 1)])
        );
    }

    #[test]
    fn test_cart_limits() {
        let errors = CreateOrderRequest {
            items: Some(Vec::new()),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert!(errors.field_errors.contains_key("items"));

        let a = Uuid::new_v4().to_string();
        let errors = CreateOrderRequest {
            items: Some(vec![
                OrderItemRequest {
                    product_id: Some(a.clone()),
                    quantity: Some(600),
                },
                OrderItemRequest {
                    product_id: Some(a),
                    quantity: Some(600),
                },
            ]),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert!(errors.field_errors.contains_key("items"));
    }

    #[test]
    fn test_product_and_items_conflict() {
        let errors = CreateOrderRequest {
            product_id: Some(Uuid::new_v4().to_string()),
            items: Some(Vec::new()),
            ..request()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.form_errors.len(), 1);
    }

    #[test]
    fn test_order_name() {
        assert_eq!(order_name("Desk", 1), "Desk");
        assert_eq!(order_name("Desk", 3), "Desk 외 2건");
    }

    #[test]
    fn test_pay_method_parsing() {
        let mut errors = ValidationErrors::new();
        assert_eq!(parse_pay_method(&mut errors, None), Some(PayMethod::Card));
        assert_eq!(
            parse_pay_method(&mut errors, Some("VIRTUAL_ACCOUNT")),
            Some(PayMethod::VirtualAccount)
        );
        assert!(errors.is_empty());
        assert_eq!(parse_pay_method(&mut errors, Some("card")), None);
        assert!(errors.field_errors.contains_key("payMethod"));
    }

    #[test]
    fn test_price_lines_checks_overflow_and_activity() {
        let product = Product {
            id: ProductId::generate(),
            name: "Desk".to_owned(),
            description: None,
            price_krw: i64::MAX / 2,
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let result = price_lines(&[(product.id, 3)], std::slice::from_ref(&product));
        assert!(matches!(result, Err(CheckoutError::Validation(_))));

        let inactive = Product {
            is_active: false,
            price_krw: 1_000,
            ..product
        };
        let result = price_lines(&[(inactive.id, 1)], std::slice::from_ref(&inactive));
        assert!(matches!(result, Err(CheckoutError::ProductNotFound)));
    }

    #[test]
    fn test_price_lines_sums_total() {
        let desk = Product {
            id: ProductId::generate(),
            name: "Desk".to_owned(),
            description: None,
            price_krw: 50_000,
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let chair = Product {
            id: ProductId::generate(),
            name: "Chair".to_owned(),
            price_krw: 20_000,
            ..desk.clone()
        };
        let (lines, total) =
            price_lines(&[(desk.id, 2), (chair.id, 1)], &[desk, chair]).unwrap();
        assert_eq!(total, Krw::new(120_000));
        assert_eq!(lines[0].line_total, Krw::new(100_000));
        assert_eq!(lines[1].product_name, "Chair");
    }
}
