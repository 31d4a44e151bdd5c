use std::time::Duration as StdDuration;

use actix_web::{http::StatusCode, test};
use serde_json::Value;
use storefront_engine::{events::EventProducers, OrderManagement};

use crate::{
    endpoint_tests::{
        helpers::{create_pending_order, issue_token, new_test_db, seed_product, test_app},
        mocks::MockGateway,
    },
    integrations::payment_gateway::{GatewayError, PaymentIntent},
    rate_limit::RateLimiter,
    realtime::RealtimeHub,
};

#[actix_web::test]
async fn intent_creation_tags_the_order_and_returns_the_client_secret() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 2).await;
    let hub = RealtimeHub::default();

    let mut gateway = MockGateway::new();
    let expected_order = order.order_id.as_str().to_string();
    gateway
        .expect_create_intent()
        .withf(move |amount, order_id| amount.value() == 240 && order_id.as_str() == expected_order)
        .times(1)
        .returning(|_, _| Ok(PaymentIntent { id: "pi_42".to_string(), client_secret: "pi_42_secret".to_string() }));
    let app = test_app!(db, hub, gateway);

    let req = test::TestRequest::post()
        .uri("/payment/create-payment-intent")
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .set_json(serde_json::json!({"amount": 240, "orderId": order.order_id.as_str()}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["clientSecret"], "pi_42_secret");
    assert_eq!(body["paymentIntentId"], "pi_42");

    let reloaded = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(reloaded.payment_intent_id.as_deref(), Some("pi_42"));
}

#[actix_web::test]
async fn mismatched_amounts_never_reach_the_gateway() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 2).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    // order total is 240; the client claims 100
    let req = test::TestRequest::post()
        .uri("/payment/create-payment-intent")
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .set_json(serde_json::json!({"amount": 100, "orderId": order.order_id.as_str()}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/payment/create-payment-intent")
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .set_json(serde_json::json!({"amount": -1, "orderId": order.order_id.as_str()}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn exceeding_the_rate_limit_blocks_before_the_gateway() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 2).await;
    let hub = RealtimeHub::default();

    let mut gateway = MockGateway::new();
    gateway.expect_create_intent().times(2).returning(|_, _| {
        Ok(PaymentIntent { id: "pi_rl".to_string(), client_secret: "pi_rl_secret".to_string() })
    });
    let limiter = RateLimiter::new(2, StdDuration::from_secs(60));
    let app = test_app!(db, hub, gateway, limiter, EventProducers::default());

    for expected in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
        let req = test::TestRequest::post()
            .uri("/payment/create-payment-intent")
            .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
            .set_json(serde_json::json!({"amount": 240, "orderId": order.order_id.as_str()}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), expected);
    }
}

#[actix_web::test]
async fn intents_for_foreign_or_settled_orders_are_rejected() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 2).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    // another customer cannot open an intent against this order
    let req = test::TestRequest::post()
        .uri("/payment/create-payment-intent")
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-2"))))
        .set_json(serde_json::json!({"amount": 240, "orderId": order.order_id.as_str()}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    // once the order is settled, no further intents may be created
    let req = test::TestRequest::post()
        .uri(&format!("/orders/{}/confirm", order.order_id.as_str()))
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let req = test::TestRequest::post()
        .uri("/payment/create-payment-intent")
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .set_json(serde_json::json!({"amount": 240, "orderId": order.order_id.as_str()}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn gateway_failures_surface_as_bad_gateway() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 2).await;
    let hub = RealtimeHub::default();

    let mut gateway = MockGateway::new();
    gateway
        .expect_create_intent()
        .times(1)
        .returning(|_, _| Err(GatewayError::Api { status: 500, message: "gateway exploded".to_string() }));
    let app = test_app!(db, hub, gateway);

    let req = test::TestRequest::post()
        .uri("/payment/create-payment-intent")
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .set_json(serde_json::json!({"amount": 240, "orderId": order.order_id.as_str()}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);
}
