//! # aroma-db: Database Layer for the Aroma Storefront
//!
//! SQLite persistence for the catalog, coupons, the loyalty program, loyalty
//! accounts, orders, newsletter signups and partners.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aroma Data Flow                                  │
//! │                                                                         │
//! │  HTTP handler (POST /api/admin/orders/{id}/status)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     aroma-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CouponRepo    │    │ 001_init     │  │   │
//! │  │   │ WAL, FKs      │    │ OrderRepo     │    │ 002_fts      │  │   │
//! │  │   │               │    │ LoyaltyRepo.. │    │ 003_program  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (AROMA_DATABASE_PATH)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aroma_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("aroma.db")).await?;
//! let products = db.products().search("oud", 20).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::coupon::CouponRepository;
pub use repository::loyalty::LoyaltyRepository;
pub use repository::loyalty_program::LoyaltyProgramRepository;
pub use repository::newsletter::NewsletterRepository;
pub use repository::order::{NewOrder, OrderRepository, OrderWithItems, ProductSales};
pub use repository::partner::PartnerRepository;
pub use repository::product::ProductRepository;
