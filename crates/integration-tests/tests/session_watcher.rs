//! Background session revalidation.

use std::time::Duration;

use copyhub_client::{Session, SessionWatcher, TokenPair};
use copyhub_integration_tests::{MockBackend, expired_token};

const PERIOD: Duration = Duration::from_millis(20);
const PATIENCE: Duration = Duration::from_secs(5);

async fn wait_for(session: &Session, authenticated: bool) {
    let mut identity = session.subscribe();
    tokio::time::timeout(
        PATIENCE,
        identity.wait_for(|identity| identity.is_authenticated == authenticated),
    )
    .await
    .expect("identity did not change in time")
    .expect("session dropped");
}

#[tokio::test]
async fn test_lapsed_token_is_renewed() {
    let mock = MockBackend::start().await;
    let session = Session::from_tokens(TokenPair {
        access_token: Some(expired_token()),
        refresh_token: Some("refresh-0".to_string()),
    });
    assert!(!session.identity().is_authenticated);

    let watcher = SessionWatcher::spawn(mock.client(), session.clone(), PERIOD);
    wait_for(&session, true).await;
    watcher.stop();

    assert!(mock.state.hits("refresh") >= 1);
    assert!(session.take_dirty());
}

#[tokio::test]
async fn test_rejected_renewal_signs_out() {
    let mock = MockBackend::start().await;
    mock.state.allow_refresh(false);
    let session = Session::from_tokens(TokenPair {
        access_token: Some(expired_token()),
        refresh_token: Some("refresh-0".to_string()),
    });

    let watcher = SessionWatcher::spawn(mock.client(), session.clone(), PERIOD);
    tokio::time::timeout(PATIENCE, async {
        while !session.snapshot().await.is_empty() {
            tokio::time::sleep(PERIOD).await;
        }
    })
    .await
    .expect("session was not signed out");
    drop(watcher);

    assert_eq!(mock.state.hits("refresh"), 1);
}

#[tokio::test]
async fn test_anonymous_session_is_left_alone() {
    let mock = MockBackend::start().await;
    let session = Session::anonymous();

    let watcher = SessionWatcher::spawn(mock.client(), session.clone(), PERIOD);
    tokio::time::sleep(PERIOD * 5).await;
    watcher.stop();

    assert_eq!(mock.state.hits("refresh"), 0);
    assert!(!session.take_dirty());
}
