//! Notification service - the user's inbox
//!
//! Mutations are applied locally first and mirrored to the backend. If the
//! backend call fails the previous inbox is put back and the error surfaced.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{user_message, Notification};
use crate::ports::NotificationBackend;

use super::auth::AuthService;
use super::sequencer::RefreshSequencer;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsState {
    /// Newest first
    pub notifications: Vec<Notification>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl NotificationsState {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}

pub struct NotificationService {
    backend: Arc<dyn NotificationBackend>,
    auth: Arc<AuthService>,
    state: watch::Sender<NotificationsState>,
    sequencer: RefreshSequencer,
}

impl NotificationService {
    pub fn new(backend: Arc<dyn NotificationBackend>, auth: Arc<AuthService>) -> Self {
        let (state, _) = watch::channel(NotificationsState::default());
        Self {
            backend,
            auth,
            state,
            sequencer: RefreshSequencer::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationsState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> NotificationsState {
        self.state.borrow().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count()
    }

    pub async fn refresh(&self) -> Result<Vec<Notification>> {
        let user = self.auth.require_user()?;
        let ticket = self.sequencer.begin();
        self.state.send_modify(|s| s.is_loading = true);

        let result = self.backend.fetch_notifications(&user.id).await;
        if !self.sequencer.is_current(ticket) {
            debug!("discarding stale inbox refresh");
            return result.map(|_| self.state.borrow().notifications.clone());
        }
        match result {
            Ok(mut list) => {
                list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                self.state.send_modify(|s| {
                    s.notifications = list.clone();
                    s.is_loading = false;
                    s.error = None;
                });
                Ok(list)
            }
            Err(e) => {
                warn!(error = %e, "inbox refresh failed");
                let message = user_message(&e);
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Apply `local`, then run `remote`; restore the old inbox if it fails
    async fn optimistic<F, Fut>(&self, local: impl FnOnce(&mut Vec<Notification>), remote: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        // Pushes and refreshes landing mid-flight would be clobbered by a restore
        self.sequencer.invalidate();
        let previous = self.state.borrow().notifications.clone();
        self.state.send_modify(|s| local(&mut s.notifications));

        match remote().await {
            Ok(()) => {
                self.state.send_modify(|s| s.error = None);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "inbox change rejected; restoring");
                let message = user_message(&e);
                self.state.send_modify(|s| {
                    s.notifications = previous;
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    fn ensure_present(&self, id: &str) -> Result<()> {
        if self.state.borrow().notifications.iter().any(|n| n.id == id) {
            Ok(())
        } else {
            Err(Error::not_found(format!("notification {}", id)))
        }
    }

    pub async fn mark_read(&self, id: &str) -> Result<()> {
        self.ensure_present(id)?;
        let backend = self.backend.clone();
        self.optimistic(
            |list| {
                for n in list.iter_mut().filter(|n| n.id == id) {
                    n.is_read = true;
                }
            },
            || async move { backend.mark_read(id).await },
        )
        .await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        let user = self.auth.require_user()?;
        let backend = self.backend.clone();
        self.optimistic(
            |list| list.iter_mut().for_each(|n| n.is_read = true),
            || async move { backend.mark_all_read(&user.id).await },
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_present(id)?;
        let backend = self.backend.clone();
        self.optimistic(
            |list| list.retain(|n| n.id != id),
            || async move { backend.delete_notification(id).await },
        )
        .await
    }

    /// Replace the inbox with a pushed snapshot
    pub fn apply_remote(&self, mut list: Vec<Notification>) {
        let Some(user) = self.auth.current_user() else {
            return;
        };
        list.retain(|n| n.user_id == user.id);
        self.sequencer.invalidate();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.state.send_modify(|s| {
            s.notifications = list;
            s.is_loading = false;
        });
    }

    /// Follow live inbox snapshots for the signed-in user, if the backend pushes them
    pub fn listen(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let user = self.auth.current_user()?;
        let mut updates = self.backend.subscribe_notifications(&user.id)?;
        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(list) => service.apply_remote(list),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "inbox stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    pub fn reset(&self) {
        self.sequencer.invalidate();
        self.state.send_replace(NotificationsState::default());
    }
}
