use actix_web::{http::StatusCode, test};
use serde_json::Value;

use crate::{
    endpoint_tests::{
        helpers::{create_pending_order, issue_token, new_test_db, seed_product, test_app},
        mocks::MockGateway,
    },
    realtime::RealtimeHub,
};

#[actix_web::test]
async fn create_order_requires_a_bearer_token() {
    let (db, _dir) = new_test_db().await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(serde_json::json!({"items": [{"productId": "P1", "quantity": 1}]}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn create_order_returns_the_priced_pending_order() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .set_json(serde_json::json!({"items": [{"productId": "P1", "quantity": 2}]}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["total_amount"], 200);
    assert_eq!(body["shipping_fee"], 40);
    assert_eq!(body["order_total"], 240);
    assert_eq!(body["customer_id"], "cust-1");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[actix_web::test]
async fn create_order_rejects_out_of_range_quantities() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    for quantity in [0, 4, -1] {
        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
            .set_json(serde_json::json!({"items": [{"productId": "P1", "quantity": quantity}]}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "quantity {quantity} must be rejected");
    }
}

#[actix_web::test]
async fn confirm_route_enforces_ownership() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 1).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let req = test::TestRequest::post()
        .uri(&format!("/orders/{}/confirm", order.order_id.as_str()))
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-2"))))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/orders/{}/confirm", order.order_id.as_str()))
        .insert_header(("Authorization", format!("Bearer {}", issue_token("cust-1"))))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "paid");
}

#[actix_web::test]
async fn double_confirm_via_the_api_is_a_conflict() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 1).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let token = issue_token("cust-1");
    let uri = format!("/orders/{}/confirm", order.order_id.as_str());
    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn cancel_route_is_pending_only() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let order = create_pending_order(&db, "cust-1", "P1", 1).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let token = issue_token("cust-1");
    let uri = format!("/orders/{}", order.order_id.as_str());
    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "cancelled");

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn order_history_lists_only_paid_orders() {
    let (db, _dir) = new_test_db().await;
    seed_product(&db, "P1", 100, 5).await;
    let paid = create_pending_order(&db, "cust-1", "P1", 1).await;
    let _still_pending = create_pending_order(&db, "cust-1", "P1", 1).await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let token = issue_token("cust-1");
    let req = test::TestRequest::post()
        .uri(&format!("/orders/{}/confirm", paid.order_id.as_str()))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/orders")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], paid.order_id.as_str());
    assert_eq!(body["total_paid"], 140);
}

#[actix_web::test]
async fn garbage_tokens_are_rejected() {
    let (db, _dir) = new_test_db().await;
    let hub = RealtimeHub::default();
    let app = test_app!(db, hub, MockGateway::untouchable());

    let req = test::TestRequest::get()
        .uri("/orders")
        .insert_header(("Authorization", "Bearer not.a.jwt"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/orders").insert_header(("Authorization", "Basic abc")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}
