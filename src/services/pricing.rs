use crate::entities::product;
use crate::errors::ServiceError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Pricing mode for the whole order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseMode {
    Customer,
    RetailerBulk,
}

/// Raw cart line as submitted at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart line with its resolved price snapshot.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total_amount: Decimal,
}

/// Resolves the unit price for one product under the given mode.
/// Bulk pricing falls back to the retailer price, then the base price.
pub fn resolve_unit_price(item: &product::Model, mode: PurchaseMode) -> Decimal {
    match mode {
        PurchaseMode::Customer => item.price,
        PurchaseMode::RetailerBulk => item
            .bulk_price
            .or(item.retailer_price)
            .unwrap_or(item.price),
    }
}

/// Rejects a line that does not meet the product's bulk minimum.
fn check_bulk_minimum(item: &product::Model, quantity: i32) -> Result<(), ServiceError> {
    if item.min_bulk_qty > 1 && quantity < item.min_bulk_qty {
        return Err(ServiceError::ValidationError(format!(
            "bulk orders of '{}' require at least {} units",
            item.name, item.min_bulk_qty
        )));
    }
    Ok(())
}

/// Prices the cart and reserves stock.
///
/// Runs two passes inside the caller's transaction: a read-only validation
/// pass over every line (existence, active flag, bulk minimum, quantity,
/// stock preview), then a conditional decrement per line
/// (`stock = stock - qty WHERE stock >= qty`). A decrement that matches no
/// row means a concurrent checkout won the remaining stock; the error rolls
/// the caller's transaction back, so no partial reservation survives.
#[instrument(skip(conn, lines), fields(line_count = lines.len(), mode = ?mode))]
pub async fn price_and_reserve<C: ConnectionTrait>(
    conn: &C,
    lines: &[CartLine],
    mode: PurchaseMode,
) -> Result<PricedCart, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "order must contain at least one item".to_string(),
        ));
    }

    let mut priced = Vec::with_capacity(lines.len());

    for line in lines {
        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }

        let item = product::Entity::find_by_id(line.product_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;

        if !item.is_active {
            return Err(ServiceError::ValidationError(format!(
                "product '{}' is no longer available",
                item.name
            )));
        }

        if mode == PurchaseMode::RetailerBulk {
            check_bulk_minimum(&item, line.quantity)?;
        }

        if line.quantity > item.stock {
            return Err(ServiceError::InsufficientStock(format!(
                "'{}' has {} units left, {} requested",
                item.name, item.stock, line.quantity
            )));
        }

        priced.push(PricedLine {
            product_id: item.id,
            name: item.name.clone(),
            quantity: line.quantity,
            unit_price: resolve_unit_price(&item, mode),
        });
    }

    // All lines validated; reserve stock with guarded decrements.
    for line in &priced {
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(line.quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(line.product_id))
            .filter(product::Column::Stock.gte(line.quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "'{}' sold out while the order was being placed",
                line.name
            )));
        }
    }

    let total_amount = priced
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();

    Ok(PricedCart {
        lines: priced,
        total_amount,
    })
}
