//! Order creation over multipart, business-rule rewording and checkout.

use axum::http::StatusCode;
use copyhub_client::types::CreateOrderRequest;
use copyhub_client::{
    ApiError, FileUpload, MISSING_EMAIL_MESSAGE, OrderConfigurator, Session, TokenPair,
    UploadedFile,
};
use copyhub_core::{ColorOption, OrderCode, OrderState, PaperType, PrintType};
use copyhub_integration_tests::{AGENCY_ID, MockBackend, live_token, price_list};
use serde_json::json;

fn signed_in(mock: &MockBackend) -> Session {
    let access = live_token(9);
    mock.state.accept_token(access.clone());
    Session::from_tokens(TokenPair {
        access_token: Some(access),
        refresh_token: Some("refresh-0".to_string()),
    })
}

/// A ready job: two files of 5 and 7 pages, A4 black and white one sided,
/// two copies.
fn ready_job() -> CreateOrderRequest {
    let mut job = OrderConfigurator::new(AGENCY_ID, price_list());
    job.add_file(UploadedFile::from_count("a.pdf", "k1", 100, Ok(5)));
    job.add_file(UploadedFile::from_count("b.pdf", "k2", 200, Ok(7)));
    job.set_paper_type(Some(PaperType::A4));
    job.set_color_option(Some(ColorOption::BlackAndWhite));
    job.set_print_type(Some(PrintType::OneSided));
    job.set_copies(2).unwrap();
    job.to_order_request().unwrap()
}

#[tokio::test]
async fn test_create_order_sends_json_and_files() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);

    let order = api
        .create_order(
            &session,
            &ready_job(),
            vec![
                FileUpload::pdf("a.pdf", vec![1; 100]),
                FileUpload::pdf("b.pdf", vec![2; 200]),
            ],
        )
        .await
        .unwrap();

    assert_eq!(order.order_code, OrderCode::from("NEW123"));
    assert_eq!(order.state, OrderState::Pending);

    let received = mock.state.received_order().unwrap();
    assert_eq!(received.order["agencyId"], json!(3));
    assert_eq!(received.order["pageCount"], json!(12));
    assert_eq!(received.order["copyCount"], json!(2));
    let price = received.order["pricePerPage"].as_f64().unwrap();
    let total = received.order["totalPrice"].as_f64().unwrap();
    assert!((price - 0.1).abs() < 1e-9, "price per page {price}");
    assert!((total - 2.4).abs() < 1e-9, "total {total}");
    assert_eq!(
        received.files,
        vec![("a.pdf".to_string(), 100), ("b.pdf".to_string(), 200)]
    );
}

#[tokio::test]
async fn test_missing_email_is_reworded() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);
    mock.state.script(
        "create_order",
        StatusCode::BAD_REQUEST,
        json!({ "message": "Customer Email is required" }),
    );

    let err = api
        .create_order(&session, &ready_job(), Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::BusinessRule(_)));
    assert_eq!(err.to_string(), MISSING_EMAIL_MESSAGE);
}

#[tokio::test]
async fn test_other_order_errors_keep_backend_message() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);
    mock.state.script(
        "create_order",
        StatusCode::BAD_REQUEST,
        json!({ "message": "Agency is not approved" }),
    );

    let err = api
        .create_order(&session, &ready_job(), Vec::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "Agency is not approved");
}

#[tokio::test]
async fn test_checkout_redirects_to_hosted_page() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);

    let url = api
        .create_checkout_session(
            &session,
            &OrderCode::from("NEW123"),
            "https://copyhub.test/checkout/success?session_id={CHECKOUT_SESSION_ID}",
            "https://copyhub.test/checkout/cancel?payment_canceled=true",
        )
        .await
        .unwrap();

    assert_eq!(url.as_str(), "https://checkout.stripe.com/c/pay/cs_test_123");
    let sent = mock.state.checkout_request().unwrap();
    assert_eq!(sent["orderCode"], json!("NEW123"));
    assert_eq!(
        sent["cancelUrl"],
        json!("https://copyhub.test/checkout/cancel?payment_canceled=true")
    );
}

#[tokio::test]
async fn test_checkout_without_session_id_fails() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);
    mock.state
        .script("checkout", StatusCode::OK, json!({ "sessionId": "  " }));

    let err = api
        .create_checkout_session(&session, &OrderCode::from("NEW123"), "s", "c")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::BusinessRule(_)));
}
