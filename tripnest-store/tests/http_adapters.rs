use serde_json::json;
use std::time::Duration;
use tripnest_core::payment::{GatewayError, PaymentGateway, PaymentOutcome};
use tripnest_core::repository::{Filter, Query, RecordStore, StoreError, RESERVATIONS};
use tripnest_shared::pii::Masked;
use tripnest_store::app_config::GatewayConfig;
use tripnest_store::{HttpPaymentGateway, RestRecordStore};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> HttpPaymentGateway {
    HttpPaymentGateway::new(&GatewayConfig {
        base_url: server.uri(),
        api_key: Masked("sk_test_123".to_string()),
        timeout_seconds: 5,
    })
    .unwrap()
}

fn rest_store(server: &MockServer) -> RestRecordStore {
    RestRecordStore::new(server.uri(), Masked("anon-key".to_string()), Duration::from_secs(5)).unwrap()
}

fn reservation_row(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": "user1",
        "destination_id": "destX",
        "start_date": "2024-06-01T00:00:00+00:00",
        "end_date": "2024-06-05T00:00:00+00:00",
        "number_of_people": 2,
        "total_price": 400.0,
        "status": status,
        "payment_reference": null,
        "created_at": "2024-05-20T10:11:12.123456+00:00"
    })
}

#[tokio::test]
async fn test_create_payment_intent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment-intents"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_json(json!({"amount": 40000, "currency": "usd"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_123",
            "client_secret": "pi_123_secret_abc",
            "amount": 40000,
            "currency": "usd"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = gateway(&server).create_payment_intent(40000, "usd").await.unwrap();
    assert_eq!(intent.reference, "pi_123");
    assert_eq!(intent.client_secret, "pi_123_secret_abc");
    assert_eq!(intent.amount, 40000);
}

#[tokio::test]
async fn test_intent_error_status_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment-intents"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "internal"}})),
        )
        .mount(&server)
        .await;

    let err = gateway(&server).create_payment_intent(100, "usd").await.unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 500, ref message } if message == "internal"));
}

#[tokio::test]
async fn test_intent_malformed_body_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment-intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let err = gateway(&server).create_payment_intent(100, "usd").await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)));
}

#[tokio::test]
async fn test_confirm_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment-intents/confirm"))
        .and(body_json(json!({"client_secret": "ok_secret", "payment_method": "pm_card_visa"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "succeeded"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment-intents/confirm"))
        .and(body_json(json!({"client_secret": "declined_secret", "payment_method": "pm_card_visa"})))
        .respond_with(
            ResponseTemplate::new(402)
                .set_body_json(json!({"error": {"message": "Your card was declined."}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment-intents/confirm"))
        .and(body_json(json!({"client_secret": "pending_secret", "payment_method": "pm_card_visa"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "requires_action"})),
        )
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    assert_eq!(
        gateway.confirm_payment("ok_secret", "pm_card_visa").await.unwrap(),
        PaymentOutcome::Succeeded
    );
    assert_eq!(
        gateway.confirm_payment("declined_secret", "pm_card_visa").await.unwrap(),
        PaymentOutcome::Declined {
            reason: "Your card was declined.".into()
        }
    );
    assert_eq!(
        gateway.confirm_payment("pending_secret", "pm_card_visa").await.unwrap(),
        PaymentOutcome::Declined {
            reason: "requires_action".into()
        }
    );
}

#[tokio::test]
async fn test_rest_query_filters_and_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .and(header("apikey", "anon-key"))
        .and(query_param("user_id", "eq.user1"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            reservation_row("r2", "pending"),
            reservation_row("r1", "confirmed")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = rest_store(&server)
        .query(
            &Query::table(RESERVATIONS)
                .where_eq("user_id", "user1")
                .order_desc("created_at"),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "r2");
}

#[tokio::test]
async fn test_rest_insert_returns_representation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([reservation_row("r1", "pending")])))
        .mount(&server)
        .await;

    let row = json!({"user_id": "user1", "status": "pending"});
    let stored = rest_store(&server)
        .insert(RESERVATIONS, row.as_object().cloned().unwrap())
        .await
        .unwrap();
    assert_eq!(stored["id"], "r1");
}

#[tokio::test]
async fn test_rest_exclusion_violation_is_overlap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint \"reservations_no_overlap\""
        })))
        .mount(&server)
        .await;

    let row = json!({"user_id": "user1"});
    let err = rest_store(&server)
        .insert(RESERVATIONS, row.as_object().cloned().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Overlap(_)));
}

#[tokio::test]
async fn test_rest_guarded_update() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reservations"))
        .and(query_param("id", "eq.r1"))
        .and(query_param("status", "eq.pending"))
        .and(body_json(json!({"status": "cancelled", "payment_reference": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let patch = json!({"status": "cancelled", "payment_reference": null});
    let rows = rest_store(&server)
        .update(
            RESERVATIONS,
            &[Filter::equals("id", "r1"), Filter::equals("status", "pending")],
            patch.as_object().cloned().unwrap(),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_rest_malformed_id_matches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .and(query_param("id", "eq.not-a-uuid"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "22P02",
            "message": "invalid input syntax for type uuid: \"not-a-uuid\""
        })))
        .mount(&server)
        .await;

    let rows = rest_store(&server)
        .query(
            &Query::table(RESERVATIONS)
                .where_eq("id", "not-a-uuid")
                .where_eq("user_id", "user1"),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_rest_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = rest_store(&server)
        .query(&Query::table(RESERVATIONS))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn test_rest_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let store = RestRecordStore::new(server.uri(), Masked("anon-key".to_string()), Duration::from_millis(200)).unwrap();
    let err = store.query(&Query::table(RESERVATIONS)).await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout(_)));
}
