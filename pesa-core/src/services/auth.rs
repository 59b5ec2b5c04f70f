//! Auth service - session lifecycle and the signed-in user
//!
//! State moves through `AuthState`. Backend auth events are folded in by
//! `AuthState::on_event`, a pure function of (state, event). While a sign-up
//! is in progress the state is `SigningUp` and `SignedIn` events are ignored,
//! so the listener never loads a profile that has not been created yet.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{user_message, Session, User, DEFAULT_CURRENCY};
use crate::ports::{AuthBackend, AuthEvent, IdentityProvider, LocalCache, ProfileUpdate, UserBackend};

/// Country assumed for profiles created from a federated sign-in
pub const DEFAULT_COUNTRY: &str = "NG";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum AuthState {
    /// Nothing checked yet
    Initial,
    Unauthenticated,
    Loading,
    /// Account created, profile not yet written
    SigningUp,
    Authenticated(User),
    Failed(String),
}

/// Follow-up work an auth event asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEffect {
    None,
    LoadProfile(String),
    ClearSession,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Next state and follow-up for a backend auth event
    pub fn on_event(&self, event: &AuthEvent) -> (AuthState, AuthEffect) {
        match (self, event) {
            (Self::SigningUp, AuthEvent::SignedIn { .. }) => (self.clone(), AuthEffect::None),
            (Self::Authenticated(user), AuthEvent::SignedIn { user_id }) if user.id == *user_id => {
                (self.clone(), AuthEffect::None)
            }
            (_, AuthEvent::SignedIn { user_id }) => {
                (Self::Loading, AuthEffect::LoadProfile(user_id.clone()))
            }
            (Self::Unauthenticated, AuthEvent::SignedOut) => (self.clone(), AuthEffect::None),
            (_, AuthEvent::SignedOut) => (Self::Unauthenticated, AuthEffect::ClearSession),
        }
    }
}

/// Fields collected by the sign-up form
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub country_code: String,
    pub preferred_currency: String,
    pub phone_number: Option<String>,
}

pub struct AuthService {
    auth: Arc<dyn AuthBackend>,
    users: Arc<dyn UserBackend>,
    cache: Arc<dyn LocalCache>,
    state: watch::Sender<AuthState>,
}

impl AuthService {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        users: Arc<dyn UserBackend>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Initial);
        Self {
            auth,
            users,
            cache,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// The signed-in user, or an auth error
    pub fn require_user(&self) -> Result<User> {
        self.current_user()
            .ok_or_else(|| Error::auth("not signed in"))
    }

    fn set(&self, next: AuthState) {
        self.state.send_replace(next);
    }

    fn fail(&self, err: Error) -> Error {
        warn!(error = %err, "auth operation failed");
        self.set(AuthState::Failed(user_message(&err)));
        err
    }

    fn become_authenticated(&self, user: User) -> User {
        if let Err(e) = self.cache.store_user(&user) {
            warn!(error = %e, "failed to cache user");
        }
        self.set(AuthState::Authenticated(user.clone()));
        user
    }

    fn remember_session(&self, session: &Session) {
        if let Err(e) = self.cache.store_session(session) {
            warn!(error = %e, "failed to cache session");
        }
    }

    // === Email / password ===

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User> {
        let mut draft = User::new(
            "",
            &request.email,
            request.first_name.trim(),
            request.last_name.trim(),
            &request.country_code,
            &request.preferred_currency,
        );
        draft.phone_number = request.phone_number.as_deref().map(User::normalize_phone);
        if let Err(msg) = draft.validate() {
            return Err(self.fail(Error::validation(msg)));
        }

        self.set(AuthState::SigningUp);
        let session = match self.auth.sign_up(&draft.email, &request.password).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };
        self.remember_session(&session);

        draft.id = session.user_id.clone();
        let created = match self.users.create_user(&draft).await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(e)),
        };
        info!(user_id = %created.id, "account created");
        Ok(self.become_authenticated(created))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(self.fail(Error::validation("email and password are required")));
        }
        self.set(AuthState::Loading);
        let session = match self.auth.sign_in(email, password).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };
        self.remember_session(&session);

        match self.load_profile(&session.user_id).await {
            Ok(user) => {
                info!(user_id = %user.id, "signed in");
                Ok(self.become_authenticated(user))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    // === Federated ===

    pub async fn sign_in_with_google(&self, id_token: &str) -> Result<User> {
        self.sign_in_federated(IdentityProvider::Google, id_token).await
    }

    pub async fn sign_in_with_apple(&self, id_token: &str) -> Result<User> {
        self.sign_in_federated(IdentityProvider::Apple, id_token).await
    }

    async fn sign_in_federated(&self, provider: IdentityProvider, id_token: &str) -> Result<User> {
        self.set(AuthState::Loading);
        let federated = match self.auth.sign_in_with_idp(provider, id_token).await {
            Ok(f) => f,
            Err(e) => return Err(self.fail(e)),
        };
        self.remember_session(&federated.session);
        let user_id = federated.session.user_id.clone();

        let existing = match self.users.fetch_user(&user_id).await {
            Ok(found) => found,
            Err(e) => return Err(self.fail(e)),
        };
        let user = match existing {
            Some(user) => user,
            None => {
                let (first, last) = split_display_name(federated.display_name.as_deref());
                let email = federated.email.clone().unwrap_or_default();
                let draft = User::new(&user_id, email, first, last, DEFAULT_COUNTRY, DEFAULT_CURRENCY);
                debug!(user_id = %user_id, provider = provider.provider_id(), "creating profile for federated user");
                match self.users.create_user(&draft).await {
                    Ok(user) => user,
                    Err(e) => return Err(self.fail(e)),
                }
            }
        };
        info!(user_id = %user.id, provider = provider.provider_id(), "signed in");
        Ok(self.become_authenticated(user))
    }

    // === Session ===

    /// Sign out and drop everything cached except settings
    pub async fn sign_out(&self) -> Result<()> {
        let remote = self.auth.sign_out().await;
        self.cache.clear()?;
        self.set(AuthState::Unauthenticated);
        info!("signed out");
        if let Err(e) = remote {
            warn!(error = %e, "backend sign-out failed; local session cleared");
        }
        Ok(())
    }

    /// Resume the persisted session, if any
    ///
    /// An expired session is renewed with its refresh token first. The
    /// cached user is shown at once. If the backend cannot be reached the
    /// cached user stays authenticated; a profile fetch that succeeds
    /// replaces it.
    pub async fn restore_session(&self) -> Result<Option<User>> {
        let Some(mut session) = self.cache.load_session()? else {
            self.set(AuthState::Unauthenticated);
            return Ok(None);
        };
        if session.is_expired() {
            debug!(user_id = %session.user_id, "cached session expired; refreshing");
            match self.auth.refresh_session(&session).await {
                Ok(fresh) => {
                    self.remember_session(&fresh);
                    session = fresh;
                }
                Err(Error::Network(reason)) => {
                    debug!(%reason, "backend unreachable during token refresh");
                    return self.resume_offline(&session.user_id, reason);
                }
                Err(e) => {
                    warn!(error = %e, "session refresh rejected");
                    self.cache.clear_session()?;
                    self.set(AuthState::Unauthenticated);
                    return Ok(None);
                }
            }
        }

        match self.auth.restore(&session).await {
            Ok(()) => {}
            // Offline: keep the session and fall back to the cached user
            Err(Error::Network(reason)) => debug!(%reason, "backend unreachable during restore"),
            Err(e) => {
                warn!(error = %e, "session rejected by backend");
                self.cache.clear_session()?;
                self.set(AuthState::Unauthenticated);
                return Ok(None);
            }
        }

        let cached = self
            .cache
            .load_user()?
            .filter(|u| u.id == session.user_id);
        match &cached {
            Some(user) => self.set(AuthState::Authenticated(user.clone())),
            None => self.set(AuthState::Loading),
        }

        match self.load_profile(&session.user_id).await {
            Ok(user) => Ok(Some(self.become_authenticated(user))),
            Err(e) => match cached {
                Some(user) => {
                    debug!(error = %e, "profile refresh failed; using cached user");
                    Ok(Some(user))
                }
                None => Err(self.fail(e)),
            },
        }
    }

    /// Serve the cached user while the session cannot be renewed
    fn resume_offline(&self, user_id: &str, reason: String) -> Result<Option<User>> {
        match self.cache.load_user()?.filter(|u| u.id == user_id) {
            Some(user) => {
                self.set(AuthState::Authenticated(user.clone()));
                Ok(Some(user))
            }
            None => Err(self.fail(Error::Network(reason))),
        }
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::validation("email is required"));
        }
        self.auth.send_password_reset(email).await
    }

    // === Events ===

    /// Fold one backend auth event into the state
    pub async fn on_auth_event(&self, event: AuthEvent) {
        let (next, effect) = self.state.borrow().on_event(&event);
        debug!(?event, ?effect, "auth event");
        self.set(next);
        match effect {
            AuthEffect::None => {}
            AuthEffect::ClearSession => {
                if let Err(e) = self.cache.clear() {
                    warn!(error = %e, "failed to clear cache after sign-out event");
                }
            }
            AuthEffect::LoadProfile(user_id) => match self.load_profile(&user_id).await {
                Ok(user) => {
                    // A sign-up or sign-out may have started while the profile loaded
                    if matches!(*self.state.borrow(), AuthState::Loading) {
                        self.become_authenticated(user);
                    }
                }
                Err(e) => {
                    if matches!(*self.state.borrow(), AuthState::Loading) {
                        self.fail(e);
                    }
                }
            },
        }
    }

    /// Follow the backend's auth-state stream, if it has one
    pub fn listen(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = self.auth.auth_events()?;
        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => service.on_auth_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    // === Profile ===

    async fn load_profile(&self, user_id: &str) -> Result<User> {
        self.users
            .fetch_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("profile for user {}", user_id)))
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        let current = self.require_user()?;
        let mut preview = current.clone();
        update.apply_to(&mut preview);
        preview.validate().map_err(Error::validation)?;

        let updated = self.users.update_user(&current.id, &update).await?;
        Ok(self.become_authenticated(updated))
    }

    pub async fn refresh_user(&self) -> Result<User> {
        let current = self.require_user()?;
        let user = self.load_profile(&current.id).await?;
        Ok(self.become_authenticated(user))
    }

    /// Patch the signed-in user locally (state + cache)
    ///
    /// Used after another service changed a user field server-side.
    pub fn patch_user(&self, f: impl FnOnce(&mut User)) -> Result<User> {
        let mut user = self.require_user()?;
        f(&mut user);
        self.cache.store_user(&user)?;
        self.set(AuthState::Authenticated(user.clone()));
        Ok(user)
    }
}

fn split_display_name(name: Option<&str>) -> (String, String) {
    let name = name.unwrap_or("").trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None if !name.is_empty() => (name.to_string(), String::new()),
        None => ("Pesa".to_string(), "User".to_string()),
    }
}
