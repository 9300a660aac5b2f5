//! Periodic session revalidation.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Session;
use crate::ApiClient;

/// Background task that re-checks a session on an interval.
///
/// Each tick re-derives the identity, which publishes a change when the
/// access token expired. When it did and a refresh token is held, the
/// tokens are renewed; a rejected refresh signs the session out.
///
/// The task stops when the watcher is dropped.
#[derive(Debug)]
pub struct SessionWatcher {
    handle: JoinHandle<()>,
}

impl SessionWatcher {
    /// Start watching `session` every `period`.
    #[must_use]
    pub fn spawn(client: ApiClient, session: Session, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                revalidate(&client, &session).await;
            }
        });

        Self { handle }
    }

    /// Stop the background task.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn revalidate(client: &ApiClient, session: &Session) {
    let identity = session.identity_check().await;
    if identity.is_authenticated || !session.needs_refresh().await {
        return;
    }

    tracing::debug!("Access token lapsed, refreshing");
    if let Err(e) = client.refresh(session).await {
        tracing::warn!(error = %e, "Session refresh failed, signing out");
        session.sign_out().await;
    }
}
