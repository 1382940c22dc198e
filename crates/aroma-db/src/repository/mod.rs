//! # Repository Module
//!
//! Database repository implementations for the storefront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.orders().transition(&id, OrderStatus::Paid, now)           │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── place(&self, new_order)        one transaction                    │
//! │  ├── transition(&self, id, to, now) one transaction                    │
//! │  │      │                                                               │
//! │  │      ├── coupon::redeem / release       (crate-private helpers     │
//! │  │      ├── loyalty::debit_points / ...     taking &mut connection)   │
//! │  │      └── product::reserve_stock / ...                               │
//! │  └── get_with_items(&self, id)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Public repository methods each take their own connection from the pool.
//! Writes spanning several tables go through the `pub(crate)` helpers so they
//! share one transaction.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, search and stock
//! - [`coupon::CouponRepository`] - Coupons and the usage counter
//! - [`loyalty_program::LoyaltyProgramRepository`] - Tiers and cashback bonuses
//! - [`loyalty::LoyaltyRepository`] - Customer accounts and the points ledger
//! - [`order::OrderRepository`] - Order placement and the status machine
//! - [`partner::PartnerRepository`] - Referral partners and commissions
//! - [`newsletter::NewsletterRepository`] - Newsletter signups

pub mod coupon;
pub mod loyalty;
pub mod loyalty_program;
pub mod newsletter;
pub mod order;
pub mod partner;
pub mod product;
