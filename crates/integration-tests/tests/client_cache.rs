//! Cached price lists and optimistic agency product deletion.

use axum::http::StatusCode;
use copyhub_client::{Session, TokenPair};
use copyhub_core::AgencyProductId;
use copyhub_integration_tests::{AGENCY_ID, MockBackend, live_token};
use serde_json::json;

fn agency_owner(mock: &MockBackend) -> Session {
    let access = live_token(21);
    mock.state.accept_token(access.clone());
    Session::from_tokens(TokenPair {
        access_token: Some(access),
        refresh_token: None,
    })
}

#[tokio::test]
async fn test_price_list_is_cached() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = Session::anonymous();

    let first = api.list_agency_products(&session, AGENCY_ID).await.unwrap();
    let second = api.list_agency_products(&session, AGENCY_ID).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.state.hits("agency_products"), 1);
}

#[tokio::test]
async fn test_refused_delete_restores_product() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = agency_owner(&mock);
    let before = api.list_agency_products(&session, AGENCY_ID).await.unwrap();
    mock.state.script(
        "delete_agency_product",
        StatusCode::CONFLICT,
        json!({ "message": "Product is used by an open order" }),
    );

    let err = api
        .delete_agency_product(&session, AGENCY_ID, AgencyProductId::new(1))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Product is used by an open order");
    let after = api.list_agency_products(&session, AGENCY_ID).await.unwrap();
    assert_eq!(after, before, "the product is back in its old position");
    assert_eq!(mock.state.hits("agency_products"), 1, "served from the cache");
}

#[tokio::test]
async fn test_confirmed_delete_stays_removed() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = agency_owner(&mock);
    api.list_agency_products(&session, AGENCY_ID).await.unwrap();

    api.delete_agency_product(&session, AGENCY_ID, AgencyProductId::new(1))
        .await
        .unwrap();

    let after = api.list_agency_products(&session, AGENCY_ID).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after.first().map(|p| p.id), Some(AgencyProductId::new(2)));
    assert_eq!(mock.state.hits("delete_agency_product"), 1);
}
