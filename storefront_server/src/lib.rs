//! # Storefront server
//! This crate hosts the HTTP surface of the preorder shop's order/payment pipeline. It is responsible for:
//! * Creating pending orders from authenticated checkout requests.
//! * Brokering payment intents with the payment gateway (rate-limited per account).
//! * Listening for signed payment webhooks from the gateway and driving the confirmation engine.
//! * Compensating unreconcilable payments with refunds.
//! * Pushing realtime order events to connected customers.
//! * Expiring overdue pending orders in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod payment_routes;
pub mod rate_limit;
pub mod realtime;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
