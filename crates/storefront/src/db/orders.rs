//! Order queries.

use async_trait::async_trait;

use respace_core::{Email, OrderId, OrderNumber, OrderStatus};

use super::{OrderRepository, PgStore, RepositoryError, conflict_on_unique};
use crate::models::{NewOrder, Order, OrderLine};

pub(super) const ORDER_COLUMNS: &str = "id, order_number, status, total_price_krw, currency, \
     customer_name, customer_email, customer_phone, user_id, guest_token, is_cart, \
     created_at, updated_at";

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (order_number, status, total_price_krw, currency, \
                 customer_name, customer_email, customer_phone, user_id, guest_token, is_cart) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.order_number.as_str())
        .bind(OrderStatus::Pending)
        .bind(order.total.as_i64())
        .bind(respace_core::CurrencyCode::KRW.as_str())
        .bind(&order.customer.name)
        .bind(order.customer.email.as_str())
        .bind(&order.customer.phone)
        .bind(order.user_id)
        .bind(order.guest_token)
        .bind(order.is_cart)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "order number"))?;

        for (position, line) in (0_i32..).zip(&order.lines) {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, product_name, \
                     quantity, unit_price_krw, line_total_krw) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(row.id)
            .bind(position)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price.as_i64())
            .bind(line.line_total.as_i64())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order =
            sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(order)
    }

    async fn find_order_by_number(
        &self,
        number: &OrderNumber,
        email: &Email,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE order_number = $1 AND lower(customer_email) = $2"
        ))
        .bind(number.as_str())
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT oi.product_id, oi.product_name, p.image_url, oi.quantity, \
                    oi.unit_price_krw, oi.line_total_krw \
             FROM order_items oi \
             LEFT JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = $1 \
             ORDER BY oi.position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}
