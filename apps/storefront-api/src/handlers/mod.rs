//! HTTP handlers, grouped by audience.
//!
//! - [`health`] - liveness and database health
//! - [`catalog`] - product search, detail, recently viewed
//! - [`public`] - origin-guarded, rate-limited endpoints without a session
//! - [`loyalty`] - the customer's account and ledger
//! - [`orders`] - checkout quote, order placement and history
//! - [`admin`] - coupons, loyalty program, order status, partners, forecast

pub mod admin;
pub mod catalog;
pub mod health;
pub mod loyalty;
pub mod orders;
pub mod public;
