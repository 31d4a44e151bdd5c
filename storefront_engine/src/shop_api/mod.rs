//! The public API of the storefront engine.
//!
//! [`order_flow_api::OrderFlowApi`] owns every order state transition; [`order_query_api::OrderQueryApi`] is the
//! read side used by the HTTP layer. Specific backends implement the traits in [`crate::traits`] to power these APIs.
pub mod order_flow_api;
pub mod order_objects;
pub mod order_query_api;
