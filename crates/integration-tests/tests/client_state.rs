//! Order state changes and the pickup code fetched on entering `Finished`.

use axum::http::StatusCode;
use copyhub_client::{Session, StateChange, TokenPair};
use copyhub_core::{OrderCode, OrderState};
use copyhub_integration_tests::{MockBackend, PICKUP_CODE, live_token};
use serde_json::json;

fn signed_in(mock: &MockBackend) -> Session {
    let access = live_token(11);
    mock.state.accept_token(access.clone());
    Session::from_tokens(TokenPair {
        access_token: Some(access),
        refresh_token: Some("refresh-0".to_string()),
    })
}

#[tokio::test]
async fn test_finishing_an_order_fetches_the_pickup_code() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);
    let code = OrderCode::from("K3J9QX");

    let change = api
        .update_order_state(&session, &code, Some(OrderState::Started), OrderState::Finished)
        .await
        .unwrap();

    assert_eq!(change, StateChange::ReadyForPickup(PICKUP_CODE.to_string()));
    assert_eq!(change.pickup_code(), Some(PICKUP_CODE));
    assert_eq!(mock.state.state_changes(), vec![json!({ "state": 3 })]);
    assert_eq!(mock.state.hits("completion_code"), 1);
}

#[tokio::test]
async fn test_other_targets_do_not_fetch_a_code() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);
    let code = OrderCode::from("K3J9QX");

    for (current, target) in [
        (OrderState::Pending, OrderState::Confirmed),
        (OrderState::Confirmed, OrderState::Started),
        (OrderState::Started, OrderState::Rejected),
    ] {
        let change = api
            .update_order_state(&session, &code, Some(current), target)
            .await
            .unwrap();
        assert_eq!(change, StateChange::Moved, "{target}");
    }

    assert_eq!(mock.state.hits("set_state"), 3);
    assert_eq!(mock.state.hits("completion_code"), 0);
}

#[tokio::test]
async fn test_missing_pickup_code_keeps_the_accepted_change() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);
    mock.state.script(
        "completion_code",
        StatusCode::NOT_FOUND,
        json!({ "message": "Code not issued yet" }),
    );

    let change = api
        .update_order_state(
            &session,
            &OrderCode::from("K3J9QX"),
            Some(OrderState::Started),
            OrderState::Finished,
        )
        .await
        .unwrap();

    assert_eq!(change, StateChange::CodeUnavailable);
    assert_eq!(change.pickup_code(), None);
    assert_eq!(mock.state.hits("set_state"), 1);
    assert_eq!(mock.state.hits("completion_code"), 1);
}

#[tokio::test]
async fn test_refused_transition_is_an_error() {
    let mock = MockBackend::start().await;
    let api = mock.client();
    let session = signed_in(&mock);
    mock.state.script(
        "set_state",
        StatusCode::CONFLICT,
        json!({ "message": "Order is already completed" }),
    );

    let err = api
        .update_order_state(
            &session,
            &OrderCode::from("K3J9QX"),
            Some(OrderState::Completed),
            OrderState::Finished,
        )
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Order is already completed");
    assert_eq!(mock.state.hits("completion_code"), 0);
}
