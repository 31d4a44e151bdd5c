//! Storefront Engine
//!
//! The storefront engine contains the core order/payment logic for the preorder shop: checkout validation, order
//! creation with an expiry deadline, the atomic payment-confirmation state machine, cancellation and expiry, and the
//! post-payment cart cleanup. It is transport-agnostic; the HTTP server crate sits on top of it.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public API instead. The exception is the data types used in the
//!    database, which are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@shop_api`]). This provides the public-facing functionality: order flow management
//!    and order queries. Backends implement the traits in [`mod@traits`] to power it.
//!
//! The engine also emits events when orders change state. A simple actor framework ([`mod@events`]) lets callers
//! hook into these events — the server uses this to push realtime notifications to connected customers.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod shop_api;
pub mod traits;

pub use shop_api::{order_flow_api::OrderFlowApi, order_objects, order_query_api::OrderQueryApi};
#[cfg(feature = "sqlite")]
pub use sqlite::{db, SqliteDatabase};
pub use traits::{CartIssue, OrderFlowError, OrderManagement, StorefrontDatabase};
