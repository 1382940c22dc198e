//! # Orders
//!
//! Order lines, the draft an order is built from, and the status state
//! machine.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────┐   ┌──────┐   ┌────────────┐   ┌─────────┐   ┌───────────┐
//! │ pending_payment │──►│ paid │──►│ processing │──►│ shipped │──►│ delivered │
//! └────────┬────────┘   └──┬───┘   └─────┬──────┘   └────┬────┘   └───────────┘
//!          │               │             │               │
//!          └───────────────┴─────────────┴───────────────┴──────► cancelled
//! ```
//!
//! `delivered` and `cancelled` are terminal. Steps cannot be skipped and
//! nothing moves backwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::cashback::weighted_base_cashback;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{OrderStatus, Percent, Product};
use crate::validation::validate_quantity;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES};

// =============================================================================
// Status Machine
// =============================================================================

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// The single forward step from this status, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::PendingPayment => Some(OrderStatus::Paid),
            OrderStatus::Paid => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether payment has been taken (coupon redeemed, points debited).
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        if to == OrderStatus::Cancelled {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }

    /// Validates a transition and returns the target status.
    pub fn transition(&self, to: OrderStatus) -> CoreResult<OrderStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CoreError::InvalidOrderTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| crate::ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: OrderStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Order Draft
// =============================================================================

/// A line of an order being built.
///
/// Product data is snapshotted when the line is created, so a price change
/// in the catalog does not affect an order already quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub cashback: Percent,
}

impl OrderLine {
    /// Snapshots a product at its effective (sale or list) price.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        OrderLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price: product.effective_price(),
            quantity,
            cashback: product.base_cashback(),
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Lines of an order before it is priced and placed.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding again increases quantity)
/// - Quantity per line is within `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_ORDER_LINES` lines
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub lines: Vec<OrderLine>,
}

impl OrderDraft {
    pub fn new() -> Self {
        OrderDraft::default()
    }

    /// Adds a product, checking it is sellable in the combined quantity.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if !product.is_active {
            return Err(CoreError::ProductNotFound(product.id.clone()));
        }

        let existing = self.lines.iter().position(|l| l.product_id == product.id);
        let combined = existing.map(|i| self.lines[i].quantity).unwrap_or(0) + quantity;

        if combined > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: combined,
                max: MAX_ITEM_QUANTITY,
            });
        }
        if !product.can_sell(combined) {
            return Err(CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: product.stock,
                requested: combined,
            });
        }

        match existing {
            Some(i) => self.lines[i].quantity = combined,
            None => {
                if self.lines.len() >= MAX_ORDER_LINES {
                    return Err(CoreError::OrderTooLarge {
                        max: MAX_ORDER_LINES,
                    });
                }
                self.lines.push(OrderLine::from_product(product, quantity));
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(|l| l.line_total()).sum()
    }

    /// Subtotal-weighted base cashback across all lines.
    pub fn base_cashback(&self) -> Percent {
        let weights: Vec<(Money, Percent)> = self
            .lines
            .iter()
            .map(|l| (l.line_total(), l.cashback))
            .collect();
        weighted_base_cashback(&weights)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
