use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use storefront_engine::{
    events::{EventHandlers, EventHooks, EventProducers, OrderPaidEvent},
    OrderFlowApi,
    OrderQueryApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenVerifier,
    config::{OrderPolicy, ServerConfig},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::payment_gateway::HttpPaymentGateway,
    middleware::SignatureMiddlewareFactory,
    payment_routes::{create_payment_intent, payment_webhook},
    rate_limit::RateLimiter,
    realtime::{RealtimeEvent, RealtimeHub},
    routes::{cancel_order, confirm_order, create_order, event_stream, health, my_orders, order_by_id},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = HttpPaymentGateway::new(&config.payment).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let hub = RealtimeHub::default();
    let producers = start_event_hooks(hub.clone());
    let _sweeper = start_expiry_worker(db.clone(), producers.clone(), config.sweep_interval);
    let srv = create_server_instance(config, db, gateway, hub, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Wires the engine's event hooks to the realtime hub: every `OrderPaid` event — whichever entry point triggered the
/// confirmation — becomes exactly one `orderConfirmed` push on the owning customer's channel.
pub fn start_event_hooks(hub: RealtimeHub) -> EventProducers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(move |ev: OrderPaidEvent| {
        let hub = hub.clone();
        Box::pin(async move {
            hub.publish(&ev.order.customer_id, RealtimeEvent::order_confirmed(&ev.order));
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(64, hooks);
    let producers = handlers.producers();
    handlers.start_handlers();
    info!("📬️ Event hooks started");
    producers
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: HttpPaymentGateway,
    hub: RealtimeHub,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    // The limiter and hub are shared across workers; everything else is cheap to build per worker.
    let limiter = web::Data::new(RateLimiter::new(config.intent_rate_limit, config.intent_rate_window));
    let hub = web::Data::new(hub);
    let srv = HttpServer::new(move || {
        let order_flow = OrderFlowApi::new(db.clone(), producers.clone());
        let order_query = OrderQueryApi::new(db.clone());
        let verifier = TokenVerifier::new(&config.auth);
        let policy = OrderPolicy::from_config(&config);
        let signature_checks = SignatureMiddlewareFactory::new(
            config.payment.webhook_secret.clone(),
            config.payment.webhook_tolerance,
            !config.payment.disable_signature_checks,
        );
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sfs::access_log"))
            .app_data(web::Data::new(order_flow))
            .app_data(web::Data::new(order_query))
            .app_data(web::Data::new(verifier))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(hub.clone())
            .app_data(limiter.clone())
            .app_data(web::Data::new(policy))
            .service(health)
            .service(
                web::resource("/orders")
                    .route(web::post().to(create_order::<SqliteDatabase>))
                    .route(web::get().to(my_orders::<SqliteDatabase>)),
            )
            .service(
                web::resource("/orders/{order_id}/confirm").route(web::post().to(confirm_order::<SqliteDatabase>)),
            )
            .service(
                web::resource("/orders/{order_id}")
                    .route(web::get().to(order_by_id::<SqliteDatabase>))
                    .route(web::delete().to(cancel_order::<SqliteDatabase>)),
            )
            .service(
                web::resource("/payment/create-payment-intent")
                    .route(web::post().to(create_payment_intent::<SqliteDatabase, HttpPaymentGateway>)),
            )
            .service(web::resource("/events").route(web::get().to(event_stream)))
            .service(
                web::scope("/webhooks")
                    .wrap(signature_checks)
                    .route("/payment", web::post().to(payment_webhook::<SqliteDatabase, HttpPaymentGateway>)),
            )
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
