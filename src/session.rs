use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::info;

use crate::error::UserNotice;

/// Explicit session context shared by the transport and gateway.
///
/// Holds the bearer token, publishes a logout event when the backend rejects
/// the session, and carries the user-notice channel the request client pushes
/// failure notifications onto. Nothing here is global; callers construct one
/// and hand out `Arc<Session>` clones.
pub struct Session {
    token: RwLock<Option<String>>,
    /// Set while the user is deliberately authenticating (login/register).
    /// A 401 in that context must not trigger the logout event, otherwise
    /// a failed sign-in attempt would bounce the user off the auth page.
    auth_flow: AtomicBool,
    logout_tx: watch::Sender<bool>,
    notice_tx: broadcast::Sender<UserNotice>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        let (logout_tx, _) = watch::channel(false);
        let (notice_tx, _) = broadcast::channel(32);
        Session {
            token: RwLock::new(token),
            auth_flow: AtomicBool::new(false),
            logout_tx,
            notice_tx,
        }
    }

    pub async fn bearer_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub fn set_auth_flow(&self, active: bool) {
        self.auth_flow.store(active, Ordering::Relaxed);
    }

    pub fn in_auth_flow(&self) -> bool {
        self.auth_flow.load(Ordering::Relaxed)
    }

    /// Clear the token and fire the logout event. Called by the transport on
    /// a 401 outside of an auth flow.
    pub async fn invalidate(&self) {
        {
            let mut token = self.token.write().await;
            if token.is_none() && *self.logout_tx.borrow() {
                return;
            }
            *token = None;
        }
        info!("Session invalidated, firing logout event");
        self.logout_tx.send_replace(true);
    }

    /// Receiver that flips to `true` when the session is invalidated.
    pub fn logged_out(&self) -> watch::Receiver<bool> {
        self.logout_tx.subscribe()
    }

    pub fn notify(&self, notice: UserNotice) {
        // No subscribers is fine; notices are best-effort.
        let _ = self.notice_tx.send(notice);
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<UserNotice> {
        self.notice_tx.subscribe()
    }
}
