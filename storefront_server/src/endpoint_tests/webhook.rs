use std::time::Duration as StdDuration;

use actix_web::{http::StatusCode, test, web, App};
use chrono::Duration;
use serde_json::Value;
use storefront_engine::{
    db_types::OrderStatusType,
    events::EventProducers,
    OrderManagement,
    OrderFlowApi,
    OrderQueryApi,
    SqliteDatabase,
};
use tokio::time::timeout;

use crate::{
    endpoint_tests::{
        helpers::{
            create_pending_order,
            new_test_db,
            seed_product,
            signature_header_for,
            signed_succeeded_event,
            test_app,
        },
        mocks::MockGateway,
    },
    integrations::payment_gateway::{GatewayError, RefundReceipt},
    middleware::SignatureMiddlewareFactory,
    payment_routes::payment_webhook,
    realtime::{RealtimeEvent, RealtimeHub},
    server::start_event_hooks,
};

const RECV_TIMEOUT: StdDuration = StdDuration::from_secs(2);

#[actix_web::test]
async fn unsigned_and_tampered_requests_are_rejected() {
    let (db, _dir) = new_test_db().await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());
    let (body, signature) = signed_succeeded_event("ord-x", "pi_x");

    // no signature header at all; middleware rejections surface as service errors in the test harness
    let req = test::TestRequest::post().uri("/webhooks/payment").set_payload(body.clone()).to_request();
    let err = test::try_call_service(&app, req).await.expect_err("unsigned request must be rejected");
    assert_eq!(actix_web::HttpResponse::from_error(err).status(), StatusCode::BAD_REQUEST);

    // signature computed over a different payload
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature))
        .set_payload(format!("{body} ")) // one byte off
        .to_request();
    let err = test::try_call_service(&app, req).await.expect_err("tampered request must be rejected");
    assert_eq!(actix_web::HttpResponse::from_error(err).status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn webhooks_are_rejected_while_the_secret_is_unconfigured() {
    let (db, _dir) = new_test_db().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(OrderFlowApi::new(db.clone(), EventProducers::default())))
            .app_data(web::Data::new(OrderQueryApi::new(db.clone())))
            .app_data(web::Data::new(MockGateway::untouchable()))
            .app_data(web::Data::new(RealtimeHub::default()))
            .service(
                web::scope("/webhooks")
                    .wrap(SignatureMiddlewareFactory::new(None, Duration::minutes(5), true))
                    .route("/payment", web::post().to(payment_webhook::<SqliteDatabase, MockGateway>)),
            ),
    )
    .await;

    let (body, signature) = signed_succeeded_event("ord-x", "pi_x");
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature))
        .set_payload(body)
        .to_request();
    let err = test::try_call_service(&app, req).await.expect_err("webhook must be rejected without a secret");
    assert_eq!(actix_web::HttpResponse::from_error(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn foreign_event_types_are_acknowledged_and_ignored() {
    let (db, _dir) = new_test_db().await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let body = serde_json::json!({"type": "charge.updated", "data": {"object": {"id": "ch_1"}}}).to_string();
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature_header_for(&body)))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: Value = test::read_body_json(res).await;
    assert_eq!(ack["received"], true);
}

#[actix_web::test]
async fn unknown_orders_are_logged_and_acknowledged() {
    let (db, _dir) = new_test_db().await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let (body, signature) = signed_succeeded_event("ord-does-not-exist", "pi_1");
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: Value = test::read_body_json(res).await;
    assert_eq!(ack["received"], true);
}

#[actix_web::test]
async fn a_succeeded_payment_confirms_the_order_and_notifies_the_customer() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 2).await;
    let hub = RealtimeHub::default();
    let mut events = hub.subscribe("cust-1");
    let producers = start_event_hooks(hub.clone());
    let app = test_app!(db, hub, MockGateway::untouchable(), crate::rate_limit::RateLimiter::new(10, StdDuration::from_secs(60)), producers);

    let (body, signature) = signed_succeeded_event(order.order_id.as_str(), "pi_1");
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: Value = test::read_body_json(res).await;
    assert_eq!(ack["received"], true);
    assert!(ack.get("skipped").is_none());

    let reloaded = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatusType::Paid);

    let event = timeout(RECV_TIMEOUT, events.recv()).await.expect("no realtime event").unwrap();
    match event {
        RealtimeEvent::OrderConfirmed(payload) => {
            assert_eq!(payload.order_id, order.order_id.as_str());
            assert_eq!(payload.status, "paid");
            assert!(payload.paid_at.is_some());
        },
        other => panic!("Expected orderConfirmed, got {other:?}"),
    }
}

#[actix_web::test]
async fn duplicate_deliveries_are_skipped_without_side_effects() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 2).await;
    let hub = RealtimeHub::default();
    let mut events = hub.subscribe("cust-1");
    let producers = start_event_hooks(hub.clone());
    let app = test_app!(db, hub, MockGateway::untouchable(), crate::rate_limit::RateLimiter::new(10, StdDuration::from_secs(60)), producers);

    let (body, signature) = signed_succeeded_event(order.order_id.as_str(), "pi_1");
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature.clone()))
        .set_payload(body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // the gateway delivers the same event again
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: Value = test::read_body_json(res).await;
    assert_eq!(ack["received"], true);
    assert_eq!(ack["skipped"], true);

    // stock was deducted exactly once, and only one orderConfirmed went out
    let product = db.fetch_product(&storefront_engine::db_types::ProductId::from("P1")).await.unwrap().unwrap();
    assert_eq!(product.quota, 3);
    timeout(RECV_TIMEOUT, events.recv()).await.expect("first confirmation must notify").unwrap();
    tokio::time::sleep(StdDuration::from_millis(200)).await;
    assert!(events.try_recv().is_err(), "the duplicate delivery must not re-notify");
}

#[actix_web::test]
async fn unreconcilable_payments_are_refunded_and_reported() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "RARE", 500, 1).await;
    let order = create_pending_order(&db, "cust-1", "RARE", 1).await;
    // a rival takes the last unit between intent creation and webhook arrival
    let rival = create_pending_order(&db, "cust-2", "RARE", 1).await;
    OrderFlowApi::new(db.clone(), EventProducers::default())
        .confirm_order(&rival.order_id, None)
        .await
        .expect("rival confirm failed");

    let hub = RealtimeHub::default();
    let mut events = hub.subscribe("cust-1");
    let mut gateway = MockGateway::new();
    gateway
        .expect_refund_intent()
        .withf(|intent_id| intent_id == "pi_contested")
        .times(1)
        .returning(|_| Ok(RefundReceipt { id: "re_1".to_string(), status: "succeeded".to_string() }));
    let app = test_app!(db, hub, gateway);

    let (body, signature) = signed_succeeded_event(order.order_id.as_str(), "pi_contested");
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: Value = test::read_body_json(res).await;
    assert_eq!(ack["received"], true);
    assert_eq!(ack["refunded"], true);

    let reloaded = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatusType::Refunded);
    assert!(reloaded.refund_reason.unwrap().contains("RARE"));
    assert!(reloaded.refunded_at.is_some());

    let event = timeout(RECV_TIMEOUT, events.recv()).await.expect("no realtime event").unwrap();
    match event {
        RealtimeEvent::OrderFailed(payload) => {
            assert_eq!(payload.order_id, order.order_id.as_str());
            assert!(payload.refunded);
            assert!(payload.reason.contains("RARE"));
        },
        other => panic!("Expected orderFailed, got {other:?}"),
    }
}

#[actix_web::test]
async fn a_failed_refund_is_acknowledged_and_flagged_for_operators() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "RARE", 500, 1).await;
    let order = create_pending_order(&db, "cust-1", "RARE", 1).await;
    let rival = create_pending_order(&db, "cust-2", "RARE", 1).await;
    OrderFlowApi::new(db.clone(), EventProducers::default())
        .confirm_order(&rival.order_id, None)
        .await
        .expect("rival confirm failed");

    let hub = RealtimeHub::default();
    let mut events = hub.subscribe("cust-1");
    let mut gateway = MockGateway::new();
    gateway
        .expect_refund_intent()
        .times(1)
        .returning(|_| Err(GatewayError::Http("connection reset by peer".to_string())));
    let app = test_app!(db, hub, gateway);

    let (body, signature) = signed_succeeded_event(order.order_id.as_str(), "pi_contested");
    let req = test::TestRequest::post()
        .uri("/webhooks/payment")
        .insert_header(("X-Payment-Signature", signature))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    // the transport acknowledgment and the business outcome are deliberately decoupled
    assert_eq!(res.status(), StatusCode::OK);
    let ack: Value = test::read_body_json(res).await;
    assert_eq!(ack["received"], true);
    assert!(ack.get("refunded").is_none());

    // no refund was recorded; the order is left for manual reconciliation
    let reloaded = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatusType::Pending);

    let event = timeout(RECV_TIMEOUT, events.recv()).await.expect("no realtime event").unwrap();
    match event {
        RealtimeEvent::OrderFailed(payload) => assert!(!payload.refunded),
        other => panic!("Expected orderFailed, got {other:?}"),
    }
}
