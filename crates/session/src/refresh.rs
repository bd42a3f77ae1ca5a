// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.
//!
//! At most one refresh call is in flight per coordinator. The decision to
//! start one is made under a short lock over the in-flight slot; the refresh
//! itself runs in a spawned task whose result is shared with every caller
//! that arrives while it runs. Callers may be cancelled without stopping the
//! refresh for the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::{AuthApi, TokenResponse};
use crate::error::RefreshError;
use crate::session::SessionObserver;
use crate::token::{TokenPair, TokenStore};

/// Initial backoff between refresh attempts that failed at the transport level.
const INITIAL_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum backoff between refresh attempts.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

type PendingRefresh = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;

/// Coordinates token refreshes across concurrent requests.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<TokenStore>,
    api: Arc<AuthApi>,
    observer: SessionObserver,
    max_retries: u32,
    in_flight: Mutex<Option<PendingRefresh>>,
    refresh_count: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<TokenStore>, api: Arc<AuthApi>, observer: SessionObserver) -> Self {
        Self::with_max_retries(store, api, observer, 0)
    }

    /// Retry transport-level refresh failures up to `max_retries` extra times.
    pub fn with_max_retries(
        store: Arc<TokenStore>,
        api: Arc<AuthApi>,
        observer: SessionObserver,
        max_retries: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                observer,
                max_retries,
                in_flight: Mutex::new(None),
                refresh_count: AtomicU64::new(0),
            }),
        }
    }

    /// Number of refresh calls sent to the backend so far.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_count.load(Ordering::Relaxed)
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Get a fresh token pair, refreshing at most once for concurrent callers.
    ///
    /// `stale_access_token` is the token the caller sent on the request that
    /// came back 401 (`None` if it went out without one). If the store
    /// already holds a different token, someone else refreshed in the
    /// meantime and the stored pair is returned without a network call.
    pub async fn refresh_or_join(
        &self,
        stale_access_token: Option<&str>,
    ) -> Result<TokenPair, RefreshError> {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    if let Some(current) = self.inner.store.snapshot() {
                        if stale_access_token != Some(current.access_token.as_str()) {
                            debug!("access token already rotated, skipping refresh");
                            return Ok(current);
                        }
                    }
                    let pending = self.start_refresh();
                    *in_flight = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Spawn the refresh task. Must be called with the in-flight slot locked.
    fn start_refresh(&self) -> PendingRefresh {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.run_refresh().await;
            // The store is already updated, so callers arriving after this
            // point take the rotated-token shortcut.
            inner.in_flight.lock().take();
            result
        });
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(RefreshError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    async fn run_refresh(&self) -> Result<TokenPair, RefreshError> {
        let Some(refresh_token) = self.store.refresh_token() else {
            warn!("token refresh needed but no refresh token is stored");
            self.sign_out();
            return Err(RefreshError::MissingRefreshToken);
        };

        match self.reissue_with_retries(&refresh_token).await {
            Ok(resp) => {
                let refresh_token = resp.refresh_token.unwrap_or(refresh_token);
                let pair = self.store.save(resp.access_token, refresh_token, resp.expires_in);
                info!(expires_at = pair.expires_at, "access token refreshed");
                Ok(pair)
            }
            Err(e) if e.is_transient() => {
                warn!(err = %e, "token refresh could not reach the backend, keeping tokens");
                Err(e)
            }
            Err(e) => {
                warn!(err = %e, "token refresh rejected, signing out");
                self.sign_out();
                Err(e)
            }
        }
    }

    async fn reissue_with_retries(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, RefreshError> {
        let mut backoff = INITIAL_RETRY_BACKOFF;
        let mut attempt = 0;
        loop {
            self.refresh_count.fetch_add(1, Ordering::Relaxed);
            match self.api.reissue(refresh_token).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(attempt, err = %e, "refresh attempt failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn sign_out(&self) {
        self.store.clear();
        self.observer.set_unauthenticated();
    }
}
