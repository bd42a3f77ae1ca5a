// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session client: owns the token store, auth API, refresh coordinator,
//! transport and observer for one running app, and drives the session
//! lifecycle (initial check, login, logout).

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::AuthApi;
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::refresh::RefreshCoordinator;
use crate::session::{Profile, SessionObserver, SessionState};
use crate::token::TokenStore;
use crate::transport::AuthenticatedTransport;

/// Current user's profile, fetched through the authenticated transport.
pub const PROFILE_PATH: &str = "/users/me";

pub struct SessionClient {
    store: Arc<TokenStore>,
    api: Arc<AuthApi>,
    observer: SessionObserver,
    refresher: RefreshCoordinator,
    transport: AuthenticatedTransport,
    locale: String,
    refresh_on_startup: bool,
    shutdown: CancellationToken,
}

impl SessionClient {
    /// Build a client on the system clock. Must be called inside a tokio
    /// runtime.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &ClientConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        crate::ensure_crypto_provider();
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .context("session client must be created inside a tokio runtime")?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build HTTP client")?;

        let mut store = TokenStore::new(clock).with_expiry_buffer(config.expiry_buffer_secs);
        if let Some(ref path) = config.token_file {
            store = store.persist_to(path);
        }
        store.load_persisted();
        let store = Arc::new(store);

        let api = Arc::new(AuthApi::new(&config.base_url, &config.auth_prefix, http.clone()));
        let observer = SessionObserver::new();
        let refresher = RefreshCoordinator::with_max_retries(
            Arc::clone(&store),
            Arc::clone(&api),
            observer.clone(),
            config.refresh_retries,
        );
        let transport = AuthenticatedTransport::new(
            http,
            &config.base_url,
            &config.auth_prefix,
            Arc::clone(&store),
            refresher.clone(),
        )
        .with_proactive_refresh(config.proactive_refresh());

        let shutdown = CancellationToken::new();
        observer.spawn_token_listener(&store, shutdown.clone());

        Ok(Self {
            store,
            api,
            observer,
            refresher,
            transport,
            locale: config.locale.clone(),
            refresh_on_startup: config.refresh_on_startup,
            shutdown,
        })
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    pub fn observer(&self) -> &SessionObserver {
        &self.observer
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    /// Resolve the session state on startup.
    ///
    /// A network failure leaves the tokens in place so a later check can
    /// succeed; an auth failure clears them.
    pub async fn check_initial(&self) -> SessionState {
        if !self.store.is_authenticated() {
            let refreshable = self.refresh_on_startup && self.store.refresh_token().is_some();
            if !refreshable {
                self.observer.set_unauthenticated();
                return self.observer.current();
            }
            let stale = self.store.access_token();
            if let Err(e) = self.refresher.refresh_or_join(stale.as_deref()).await {
                warn!(err = %e, "startup token refresh failed");
                self.observer.set_unauthenticated();
                return self.observer.current();
            }
        }

        match self.fetch_profile().await {
            Ok(profile) => {
                info!(id = %profile.id, "session restored");
                self.observer.set_authenticated(profile);
            }
            Err(e) if e.requires_reauth() => {
                warn!(code = %e.code(), "stored session rejected, signing out");
                self.store.clear();
                self.observer.set_unauthenticated();
            }
            Err(e) => {
                warn!(code = %e.code(), err = %e, "could not verify session, keeping tokens");
                self.observer.set_unauthenticated();
            }
        }
        self.observer.current()
    }

    /// Exchange a federated identity token for a session.
    pub async fn login(&self, id_token: &str) -> Result<Profile, SessionError> {
        let resp = self.api.social_login(id_token, &self.locale).await?;
        self.store.save(resp.access_token, resp.refresh_token, resp.expires_in);

        match self.fetch_profile().await {
            Ok(profile) => {
                info!(id = %profile.id, "signed in");
                self.observer.set_authenticated(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                warn!(err = %e, "profile fetch after login failed, discarding tokens");
                self.store.clear();
                self.observer.set_unauthenticated();
                Err(e)
            }
        }
    }

    /// Revoke the session on the server if possible, then sign out locally.
    pub async fn logout(&self) {
        let token = self.store.access_token();
        if let Err(e) = self.api.logout(token.as_deref()).await {
            warn!(err = %e, "server-side logout failed, clearing local session anyway");
        }
        self.store.clear();
        self.observer.set_unauthenticated();
        info!("signed out");
    }

    /// `GET /users/me` through the authenticated transport.
    pub async fn fetch_profile(&self) -> Result<Profile, SessionError> {
        let resp = self.transport.execute(self.transport.get(PROFILE_PATH)).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::UnexpectedStatus {
                path: PROFILE_PATH.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<Profile>()
            .await
            .map_err(|e| SessionError::InvalidResponse(format!("profile: {e}")))
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
