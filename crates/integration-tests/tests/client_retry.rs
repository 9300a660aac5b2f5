//! Exponential backoff for idempotent requests.

use axum::http::StatusCode;
use copyhub_client::types::CreateOrderRequest;
use copyhub_client::{FileUpload, Session, TokenPair};
use copyhub_core::{AgencyId, ColorOption, PaperType, PrintType};
use copyhub_integration_tests::{MockBackend, live_token};
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn test_get_retries_transient_failures() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    mock.state
        .script("agencies", StatusCode::SERVICE_UNAVAILABLE, json!({ "message": "warming up" }));
    mock.state
        .script("agencies", StatusCode::TOO_MANY_REQUESTS, json!({ "message": "slow down" }));

    let agencies = api.list_agencies(&Session::anonymous()).await.unwrap();

    assert_eq!(agencies.len(), 2);
    assert_eq!(mock.state.hits("agencies"), 3);
}

#[tokio::test]
async fn test_get_gives_up_after_max_retries() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    for _ in 0..4 {
        mock.state
            .script("agencies", StatusCode::BAD_GATEWAY, json!({ "message": "down" }));
    }

    let err = api.list_agencies(&Session::anonymous()).await.unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(mock.state.hits("agencies"), 4, "first attempt plus three retries");
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    mock.state
        .script("agencies", StatusCode::NOT_FOUND, json!({ "message": "gone" }));

    let err = api.list_agencies(&Session::anonymous()).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(mock.state.hits("agencies"), 1);
}

#[tokio::test]
async fn test_post_is_never_retried() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let access = live_token(5);
    mock.state.accept_token(access.clone());
    let session = Session::from_tokens(TokenPair {
        access_token: Some(access),
        refresh_token: None,
    });
    mock.state.script(
        "create_order",
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "message": "try later" }),
    );

    let order = CreateOrderRequest {
        agency_id: AgencyId::new(3),
        paper_type: PaperType::A4,
        color_option: ColorOption::BlackAndWhite,
        print_type: PrintType::OneSided,
        page_count: 12,
        copy_count: 2,
        price_per_page: Decimal::new(10, 2),
        total_price: Decimal::new(240, 2),
    };
    let err = api
        .create_order(&session, &order, vec![FileUpload::pdf("a.pdf", b"%PDF".to_vec())])
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(mock.state.hits("create_order"), 1);
}
