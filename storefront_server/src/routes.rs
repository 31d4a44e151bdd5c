//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into a separate module.
//! Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage traits so that endpoint tests can substitute lightweight backends; the
//! server instantiates them with [`storefront_engine::SqliteDatabase`].
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use storefront_engine::{
    db_types::OrderId,
    order_objects::OrderWithItems,
    OrderFlowApi,
    OrderManagement,
    OrderQueryApi,
    StorefrontDatabase,
};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    auth::JwtClaims,
    config::OrderPolicy,
    data_objects::CreateOrderRequest,
    errors::ServerError,
    realtime::RealtimeHub,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

/// Route handler for `POST /orders`.
///
/// Creates a pending order from the submitted cart lines. The cart is validated against the catalog as a whole —
/// either the entire order is created, or nothing is. No stock is reserved; quotas are enforced at confirmation.
pub async fn create_order<B: StorefrontDatabase>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
    policy: web::Data<OrderPolicy>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    request.validate().map_err(ServerError::InvalidRequestBody)?;
    debug!("💻️ POST create order for {} with {} line(s)", claims.sub, request.items.len());
    let (order, items) = api
        .create_order(claims.customer_id(), request.into_cart_lines(), policy.shipping_fee, policy.order_expiry)
        .await?;
    Ok(HttpResponse::Ok().json(OrderWithItems { order, items }))
}

/// Route handler for `GET /orders`.
///
/// Returns the caller's paid order history, newest first. The customer identity comes from the bearer token.
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let history = api.paid_order_history(claims.customer_id()).await.map_err(|e| {
        debug!("💻️ Could not fetch order history. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(history))
}

/// Route handler for `GET /orders/{order_id}`.
///
/// Returns a single order with its line items. Other customers' orders are reported as not found, whether they
/// exist or not.
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id}) for {}", claims.sub);
    let order = api.fetch_order(&order_id, Some(claims.customer_id())).await.map_err(|e| {
        debug!("💻️ Could not fetch order. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    match order {
        Some(order) => Ok(HttpResponse::Ok().json(order)),
        None => Err(ServerError::NoRecordFound(format!("Order {order_id}"))),
    }
}

/// Route handler for `POST /orders/{order_id}/confirm`.
///
/// The authenticated path into the confirmation engine; ownership is enforced. The webhook path enters the very
/// same engine, so the two may race freely — exactly one of them wins.
pub async fn confirm_order<B: StorefrontDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ POST confirm order {order_id} for {}", claims.sub);
    let (order, items) = api.confirm_order(&order_id, Some(claims.customer_id())).await.map_err(|e| {
        debug!("💻️ Could not confirm order {order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(OrderWithItems { order, items }))
}

/// Route handler for `DELETE /orders/{order_id}`.
///
/// Cancels one of the caller's own pending orders.
pub async fn cancel_order<B: StorefrontDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ DELETE order {order_id} for {}", claims.sub);
    let order = api.cancel_order(&order_id, claims.customer_id()).await.map_err(|e| {
        debug!("💻️ Could not cancel order {order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Events  ----------------------------------------------------

/// Route handler for `GET /events`.
///
/// A Server-Sent-Events stream of the caller's realtime channel (`orderConfirmed` / `orderFailed`). Delivery is
/// best-effort; the order store is the durable source of truth.
pub async fn event_stream(claims: JwtClaims, hub: web::Data<RealtimeHub>) -> HttpResponse {
    debug!("💻️ GET event stream for {}", claims.sub);
    let receiver = hub.subscribe(claims.customer_id());
    let customer = claims.sub;
    let stream = futures::stream::unfold(receiver, move |mut receiver| {
        let customer = customer.clone();
        async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        return Some((
                            Ok::<web::Bytes, actix_web::Error>(web::Bytes::from(event.to_sse_frame())),
                            receiver,
                        ))
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("📡️ Event stream for {customer} lagged; {skipped} event(s) dropped");
                        continue;
                    },
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    });
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}
