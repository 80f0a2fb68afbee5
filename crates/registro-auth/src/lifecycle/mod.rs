//! Token lifecycle management.
//!
//! [`TokenManager`] owns the access/refresh token pair and guarantees every
//! outbound request carries a bearer token, recovering transparently from
//! expiry.
//!
//! # Recovery protocol
//!
//! When a request comes back `401 Unauthorized`:
//!
//! 1. If no refresh is in flight, the caller becomes the leader: it marks the
//!    manager as refreshing, resets the broadcast slot and calls the refresh
//!    endpoint. On success it stores and publishes the new token, then
//!    retries its request once. On failure the stored credentials are purged
//!    and the error is returned without a retry.
//! 2. If a refresh is in flight, the caller subscribes to the slot, waits for
//!    the published token and retries its own request once with it.
//!
//! At most one refresh call is in flight at any time. Waiting is bounded by
//! [`LifecycleConfig::refresh_timeout`]. A leader whose future is dropped
//! mid-refresh releases the flag and wakes the waiters, which then recover
//! on their own; so does a waiter whose joined refresh failed without a
//! logout (a proactive attempt).
//!
//! # Proactive refresh
//!
//! [`TokenManager::spawn_proactive_refresh`] renews the token on a fixed
//! period through the same coordination. A proactive failure stops the timer
//! but keeps the stored credentials; the next 401 still gets a reactive
//! attempt.

mod proactive;
mod slot;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Request, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use tokio::sync::watch;

use crate::config::LifecycleConfig;
use crate::credential::{Credential, TokenResponse, is_usable_token};
use crate::storage::CredentialStore;
use crate::{AuthError, AuthResult};

pub use proactive::ProactiveRefresh;
use slot::{LeaderGuard, RefreshSlot};

/// What started a refresh. Decides the failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// A request observed a 401. Failure logs the user out.
    Reactive,
    /// The background timer fired. Failure only stops the timer.
    Proactive,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Owns the session credentials and coordinates token renewal.
///
/// Construct once per session and share it as `Arc<TokenManager>`.
pub struct TokenManager {
    http: Client,
    base_url: String,
    config: LifecycleConfig,
    store: Arc<dyn CredentialStore>,
    credential: ArcSwapOption<Credential>,
    refreshing: Mutex<bool>,
    slot: watch::Sender<RefreshSlot>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("base_url", &self.base_url)
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a manager with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(
        base_url: &str,
        config: LifecycleConfig,
        store: Arc<dyn CredentialStore>,
    ) -> AuthResult<Self> {
        Self::with_client(Client::new(), base_url, config, store)
    }

    /// Creates a manager that sends requests through `http`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn with_client(
        http: Client,
        base_url: &str,
        config: LifecycleConfig,
        store: Arc<dyn CredentialStore>,
    ) -> AuthResult<Self> {
        config.validate().map_err(AuthError::configuration)?;
        let (slot, _) = watch::channel(RefreshSlot::Idle);
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            store,
            credential: ArcSwapOption::empty(),
            refreshing: Mutex::new(false),
            slot,
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Loads persisted tokens into the cache. Returns `true` if a session was restored.
    pub async fn restore(&self) -> AuthResult<bool> {
        let credential = self.store.load().await?.and_then(Credential::from_stored);
        let restored = credential.is_some();
        self.credential.store(credential.map(Arc::new));
        tracing::debug!(restored, "Restored session from credential store");
        Ok(restored)
    }

    /// Current credential, if logged in.
    #[must_use]
    pub fn credential(&self) -> Option<Arc<Credential>> {
        self.credential.load_full()
    }

    /// Cached access token, if logged in.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.credential
            .load_full()
            .map(|c| c.access_token().to_string())
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.credential.load().is_some()
    }

    /// Returns `true` if the current session carries `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.credential
            .load_full()
            .is_some_and(|c| c.has_role(role))
    }

    /// Authenticates with email and password and stores the issued tokens.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if either value is empty (no request is made)
    /// - `InvalidCredentials` if the backend answers 401
    /// - `Network`/`Http`/`InvalidResponse` for transport and server failures
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Arc<Credential>> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::invalid_input("email and password are required"));
        }

        let response = self
            .http
            .post(self.url(&self.config.login_path))
            .json(&LoginRequest {
                email: email.trim(),
                password,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_status(status.as_u16(), body));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::invalid_response(e.to_string()))?;
        if !is_usable_token(&tokens.access_token) {
            return Err(AuthError::invalid_response("login returned an empty access token"));
        }

        let credential = Arc::new(
            Credential::new(tokens.access_token, tokens.refresh_token).with_email_fallback(email),
        );
        self.store.save(&credential.to_stored()).await?;
        self.credential.store(Some(Arc::clone(&credential)));
        tracing::info!(email = email.trim(), "Logged in");
        Ok(credential)
    }

    /// Clears the session. Returns `true` if credentials were stored.
    pub async fn logout(&self) -> AuthResult<bool> {
        let was_cached = self.credential.swap(None).is_some();
        let was_stored = self.store.clear().await?;
        tracing::info!("Logged out");
        Ok(was_cached || was_stored)
    }

    /// Asks the backend to send a password reset email.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        if email.trim().is_empty() {
            return Err(AuthError::invalid_input("email is required"));
        }
        let response = self
            .http
            .get(self.url(&self.config.forgot_password_path))
            .query(&[("email", email.trim())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_status(status.as_u16(), body));
        }
        Ok(())
    }

    /// Returns `true` for the login and refresh endpoints, which are never
    /// given a bearer token nor recovered.
    #[must_use]
    pub fn is_excluded(&self, url: &Url) -> bool {
        let url = url.as_str();
        url.contains(&self.config.login_path) || url.contains(&self.config.refresh_path)
    }

    /// Adds `Authorization: Bearer <token>` using the cached access token.
    ///
    /// Requests to excluded endpoints, and requests made while logged out,
    /// are returned unchanged.
    #[must_use]
    pub fn attach_token(&self, request: Request) -> Request {
        let token = self.access_token();
        self.attach(request, token.as_deref())
    }

    fn attach(&self, mut request: Request, token: Option<&str>) -> Request {
        if self.is_excluded(request.url()) {
            return request;
        }
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Cached access token is not a valid header value"),
            }
        }
        request
    }

    /// Sends a request with the cached token, recovering once from a 401.
    ///
    /// Any status other than 401 is returned unchanged. Requests whose body
    /// cannot be cloned are not retried; use [`dispatch_with`](Self::dispatch_with)
    /// for those.
    ///
    /// # Errors
    ///
    /// Transport failures, and refresh failures during recovery.
    pub async fn dispatch(&self, request: Request) -> AuthResult<Response> {
        let retry = request.try_clone();
        self.send(request, move || retry).await
    }

    /// Like [`dispatch`](Self::dispatch) but rebuilds the request for the
    /// retry, so streaming bodies (multipart uploads) can be replayed.
    pub async fn dispatch_with<F>(&self, build: F) -> AuthResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let request = build().build()?;
        self.send(request, || build().build().ok()).await
    }

    async fn send(
        &self,
        request: Request,
        retry: impl FnOnce() -> Option<Request>,
    ) -> AuthResult<Response> {
        if self.is_excluded(request.url()) {
            return Ok(self.http.execute(request).await?);
        }

        let sent_with = self.access_token();
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(%method, %url, "Dispatching request");

        let response = self
            .http
            .execute(self.attach(request, sent_with.as_deref()))
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(retry) = retry() else {
            tracing::warn!(%method, %url, "Received 401 for a request that cannot be replayed");
            return Ok(response);
        };

        tracing::debug!(%method, %url, "Received 401, recovering session");
        let token = self.recover(sent_with.as_deref()).await?;
        Ok(self.http.execute(self.attach(retry, Some(&token))).await?)
    }

    /// Obtains a token to retry with after a 401.
    async fn recover(&self, failed_token: Option<&str>) -> AuthResult<String> {
        loop {
            let waiter = {
                let mut refreshing = self.refreshing.lock();
                if *refreshing {
                    Some(self.slot.subscribe())
                } else {
                    if let Some(current) = self.access_token()
                        && Some(current.as_str()) != failed_token
                    {
                        tracing::debug!("Token was renewed while the request was in flight");
                        return Ok(current);
                    }
                    *refreshing = true;
                    self.slot.send_replace(RefreshSlot::Pending);
                    None
                }
            };

            let Some(rx) = waiter else {
                let leader = LeaderGuard::new(&self.refreshing, &self.slot);
                return self
                    .lead_refresh(Trigger::Reactive, leader)
                    .await
                    .map(|c| c.access_token().to_string());
            };

            match self.await_refresh(rx).await? {
                Some(token) => return Ok(token),
                // The refresh we joined failed without logging out (proactive
                // or cancelled): recover again, leading a reactive refresh.
                None => tracing::debug!("Joined refresh failed without logout, recovering again"),
            }
        }
    }

    /// Waits for the in-flight refresh. `Ok(None)` means it failed without
    /// purging the session.
    async fn await_refresh(
        &self,
        mut rx: watch::Receiver<RefreshSlot>,
    ) -> AuthResult<Option<String>> {
        let timeout = self.config.refresh_timeout;
        let settled = tokio::time::timeout(timeout, async move {
            let slot = rx
                .wait_for(RefreshSlot::is_settled)
                .await
                .map(|slot| (*slot).clone());
            slot
        })
        .await;

        match settled {
            Err(_) => Err(AuthError::RefreshTimeout {
                seconds: timeout.as_secs(),
            }),
            Ok(Ok(RefreshSlot::Ready(token))) => Ok(Some(token)),
            Ok(Ok(RefreshSlot::Failed { purged: false, .. })) => Ok(None),
            Ok(Ok(RefreshSlot::Failed { reason, .. })) => Err(AuthError::session_expired(reason)),
            Ok(Ok(_)) | Ok(Err(_)) => Err(AuthError::session_expired("token refresh was abandoned")),
        }
    }

    /// Runs one refresh as the leader.
    async fn lead_refresh(
        &self,
        trigger: Trigger,
        leader: LeaderGuard<'_>,
    ) -> AuthResult<Arc<Credential>> {
        match self.request_refresh().await {
            Ok(credential) => {
                let credential = Arc::new(credential);
                self.credential.store(Some(Arc::clone(&credential)));
                if let Err(e) = self.store.save(&credential.to_stored()).await {
                    tracing::warn!(error = %e, "Failed to persist refreshed tokens");
                }
                leader.settle(RefreshSlot::Ready(credential.access_token().to_string()));
                tracing::info!(?trigger, "Access token refreshed");
                Ok(credential)
            }
            Err(err) => {
                let purged = trigger == Trigger::Reactive;
                if purged {
                    tracing::warn!(error = %err, "Token refresh failed, logging out");
                    self.purge().await;
                } else {
                    tracing::warn!(error = %err, "Proactive token refresh failed");
                }
                leader.settle(RefreshSlot::Failed {
                    reason: err.to_string(),
                    purged,
                });
                Err(err)
            }
        }
    }

    /// Calls the refresh endpoint with the stored refresh token.
    async fn request_refresh(&self) -> AuthResult<Credential> {
        let Some(current) = self.credential.load_full() else {
            return Err(AuthError::session_expired("not logged in"));
        };
        let Some(refresh_token) = current.refresh_token() else {
            return Err(AuthError::session_expired("no refresh token available"));
        };

        let timeout = self.config.refresh_timeout;
        let call = async {
            let response = self
                .http
                .post(self.url(&self.config.refresh_path))
                .query(&[("refreshToken", refresh_token)])
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::from_status(status.as_u16(), body));
            }
            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| AuthError::invalid_response(e.to_string()))
        };

        let tokens = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| AuthError::RefreshTimeout {
                seconds: timeout.as_secs(),
            })??;
        if !is_usable_token(&tokens.access_token) {
            return Err(AuthError::invalid_response(
                "refresh returned an empty access token",
            ));
        }
        Ok(current.renewed(tokens))
    }

    async fn purge(&self) {
        self.credential.store(None);
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "Failed to clear stored credentials");
        }
    }

    /// Runs one proactive refresh.
    ///
    /// Returns `Ok(false)` without a network call when a refresh is already
    /// in flight. Failures leave the stored credentials untouched.
    pub async fn refresh_proactively(&self) -> AuthResult<bool> {
        {
            let mut refreshing = self.refreshing.lock();
            if *refreshing {
                return Ok(false);
            }
            *refreshing = true;
            self.slot.send_replace(RefreshSlot::Pending);
        }
        let leader = LeaderGuard::new(&self.refreshing, &self.slot);
        self.lead_refresh(Trigger::Proactive, leader).await.map(|_| true)
    }

    /// Starts the proactive refresh timer.
    #[must_use]
    pub fn spawn_proactive_refresh(self: &Arc<Self>) -> ProactiveRefresh {
        ProactiveRefresh::spawn(self)
    }
}
