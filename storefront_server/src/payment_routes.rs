//----------------------------------------------   Payments  ----------------------------------------------------
//
// The payment-intent endpoint and the gateway webhook. The webhook's signature has already been verified by the
// signature middleware by the time the handler runs; every response from the handler itself is a 200-level
// acknowledgment, because a non-2xx response makes the gateway retry forever. The business outcome travels in the
// acknowledgment body and, for connected customers, over the realtime channel.
use actix_web::{web, HttpResponse};
use log::*;
use storefront_engine::{
    db_types::{Order, OrderId, OrderStatusType},
    OrderFlowApi,
    OrderFlowError,
    OrderQueryApi,
    StorefrontDatabase,
};

use crate::{
    auth::JwtClaims,
    data_objects::{PaymentIntentRequest, PaymentIntentResult, WebhookAck},
    errors::ServerError,
    integrations::payment_gateway::{GatewayError, PaymentEvent, PaymentGateway},
    rate_limit::RateLimiter,
    realtime::{RealtimeEvent, RealtimeHub},
};

/// Route handler for `POST /payment/create-payment-intent`.
///
/// Obtains a client-usable payment handle from the gateway for one of the caller's pending orders. The rate limit
/// is checked before anything else — a rejected request must never reach the gateway. The submitted amount has to
/// match the order total exactly; the client never dictates what is charged.
pub async fn create_payment_intent<B, G>(
    claims: JwtClaims,
    body: web::Json<PaymentIntentRequest>,
    flow: web::Data<OrderFlowApi<B>>,
    query: web::Data<OrderQueryApi<B>>,
    gateway: web::Data<G>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    G: PaymentGateway + 'static,
{
    let request = body.into_inner();
    request.validate().map_err(ServerError::InvalidRequestBody)?;
    if !limiter.check(claims.customer_id()) {
        info!("💳️ Rate limit exceeded for {} creating payment intents", claims.sub);
        return Err(ServerError::RateLimited);
    }
    let order_id = OrderId::from(request.order_id.clone());
    debug!("💳️ POST create payment intent for order {order_id} by {}", claims.sub);
    let order = query
        .fetch_order(&order_id, Some(claims.customer_id()))
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?
        .order;
    if order.status != OrderStatusType::Pending {
        return Err(OrderFlowError::InvalidState { order: order.order_id, status: order.status }.into());
    }
    if request.amount != order.order_total.value() {
        return Err(ServerError::InvalidRequestBody(format!(
            "amount {} does not match the order total {}",
            request.amount, order.order_total
        )));
    }
    let intent = gateway.create_intent(order.order_total, &order.order_id).await.map_err(|e| match e {
        GatewayError::MissingCredentials => ServerError::ConfigurationError(e.to_string()),
        e => {
            warn!("💳️ Could not create payment intent for order {order_id}. {e}");
            ServerError::PaymentGatewayError(e.to_string())
        },
    })?;
    if let Err(e) = flow.attach_payment_intent(&order.order_id, &intent.id).await {
        // the intent already exists at the gateway; the webhook carries the intent id, so this is not fatal
        warn!("💳️ Could not record intent {} on order {order_id}: {e}", intent.id);
    }
    Ok(HttpResponse::Ok()
        .json(PaymentIntentResult { client_secret: intent.client_secret, payment_intent_id: intent.id }))
}

/// Route handler for `POST /webhooks/payment` (gateway-invoked).
///
/// Maps gateway events onto the confirmation engine. Only `payment_intent.succeeded` triggers any action; duplicate
/// deliveries are short-circuited on the already-paid check (and again by the engine's own pending-status guard,
/// since a duplicate may race the first delivery). When confirmation fails on a business rule, the charged payment
/// is compensated with a refund.
pub async fn payment_webhook<B, G>(
    body: web::Bytes,
    flow: web::Data<OrderFlowApi<B>>,
    query: web::Data<OrderQueryApi<B>>,
    gateway: web::Data<G>,
    hub: web::Data<RealtimeHub>,
) -> HttpResponse
where
    B: StorefrontDatabase,
    G: PaymentGateway + 'static,
{
    trace!("🛒️ Received payment webhook ({} bytes)", body.len());
    let event: PaymentEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("🛒️ Could not parse webhook payload. {e}");
            return HttpResponse::Ok().json(WebhookAck::received().with_message("Unparseable payload."));
        },
    };
    if !event.is_payment_succeeded() {
        trace!("🛒️ Ignoring webhook event type {}", event.event_type);
        return HttpResponse::Ok().json(WebhookAck::received());
    }
    let intent_id = event.data.object.id.clone();
    let order_id = match event.order_id() {
        Some(id) => id,
        None => {
            warn!("🛒️ Anomaly: succeeded payment {intent_id} carries no order id metadata. Nothing to reconcile.");
            return HttpResponse::Ok().json(WebhookAck::received().with_message("No order metadata."));
        },
    };
    info!("🛒️ Payment {intent_id} succeeded for order {order_id}");
    let order = match query.fetch_order(&order_id, None).await {
        Ok(Some(order)) => order.order,
        Ok(None) => {
            warn!("🛒️ Anomaly: webhook refers to order {order_id}, which does not exist.");
            return HttpResponse::Ok().json(WebhookAck::received().with_message("Unknown order."));
        },
        Err(e) => {
            error!("🛒️ Could not load order {order_id} while handling a webhook. {e}");
            return HttpResponse::Ok().json(WebhookAck::received().with_message("Backend error."));
        },
    };
    if order.status == OrderStatusType::Paid {
        info!("🛒️ Order {order_id} is already paid. Acknowledging duplicate delivery.");
        return HttpResponse::Ok().json(WebhookAck::skipped());
    }
    match flow.confirm_order(&order_id, None).await {
        Ok((order, _items)) => {
            // the order-paid hook pushes `orderConfirmed` to the customer's channel
            info!("🛒️ Order {} reconciled and marked as paid.", order.order_id);
            HttpResponse::Ok().json(WebhookAck::received())
        },
        Err(OrderFlowError::InvalidState { status: OrderStatusType::Paid, .. }) => {
            // a duplicate delivery raced us past the short-circuit above; the engine caught it
            info!("🛒️ Order {order_id} was paid concurrently. Acknowledging duplicate delivery.");
            HttpResponse::Ok().json(WebhookAck::skipped())
        },
        Err(
            e @ (OrderFlowError::InsufficientStock(_)
            | OrderFlowError::OrderExpired(_)
            | OrderFlowError::InvalidState { .. }),
        ) => compensate_failed_payment(&order, &intent_id, &e.to_string(), &flow, gateway.as_ref(), &hub).await,
        Err(e) => {
            error!("🛒️ Could not confirm order {order_id} from webhook. {e}");
            HttpResponse::Ok().json(WebhookAck::received().with_message("Could not confirm order."))
        },
    }
}

/// The compensation branch: the gateway captured the payment, but the order could not be reconciled (stock ran out
/// between intent creation and webhook arrival, the order expired, or it reached a terminal state some other way).
/// The charge is refunded, the order is marked `refunded` with the reason, and the customer is notified.
///
/// A failed refund call is the one case with no safe automated recovery: retrying against an unknown gateway state
/// risks a double refund, so it is surfaced for an operator instead.
async fn compensate_failed_payment<B, G>(
    order: &Order,
    intent_id: &str,
    reason: &str,
    flow: &OrderFlowApi<B>,
    gateway: &G,
    hub: &RealtimeHub,
) -> HttpResponse
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    warn!(
        "🛒️ Payment {intent_id} for order {} succeeded at the gateway but could not be reconciled: {reason}. \
         Issuing a refund.",
        order.order_id
    );
    match gateway.refund_intent(intent_id).await {
        Ok(receipt) => {
            let published = match flow.mark_order_refunded(&order.order_id, reason).await {
                Ok(updated) => updated,
                Err(e) => {
                    error!(
                        "🛒️ Refund {} was issued but order {} could not be marked as refunded: {e}",
                        receipt.id, order.order_id
                    );
                    order.clone()
                },
            };
            hub.publish(&order.customer_id, RealtimeEvent::order_failed(&published, reason, true));
            HttpResponse::Ok().json(WebhookAck::refunded().with_message(reason))
        },
        Err(e) => {
            error!(
                "🚨️ MANUAL INTERVENTION REQUIRED: the refund for intent {intent_id} (order {}) failed: {e}. The \
                 customer has been charged but the order cannot be fulfilled, and an automatic retry is unsafe. An \
                 operator must reconcile this payment against the gateway by hand.",
                order.order_id
            );
            hub.publish(&order.customer_id, RealtimeEvent::order_failed(order, reason, false));
            HttpResponse::Ok().json(WebhookAck::received().with_message("Refund failed; manual intervention required."))
        },
    }
}
