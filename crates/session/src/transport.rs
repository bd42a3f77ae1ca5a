// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated HTTP transport.
//!
//! Wraps a `reqwest::Client`: attaches the stored bearer token to every
//! request outside the auth prefix, and on a 401 refreshes (or joins a
//! refresh already in flight) and retries the request exactly once. The
//! retry carries [`RETRY_MARKER_HEADER`] so it is never retried again.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::refresh::RefreshCoordinator;
use crate::token::TokenStore;

/// Marks a request as the single post-refresh retry.
pub const RETRY_MARKER_HEADER: &str = "x-retry-with-refresh";

/// HTTP client that keeps requests authenticated.
pub struct AuthenticatedTransport {
    http: Client,
    base_url: String,
    /// Auth prefix joined to the base URL's own path, e.g. `/api/auth/`.
    auth_path: String,
    store: Arc<TokenStore>,
    refresher: RefreshCoordinator,
    proactive_refresh: bool,
}

impl AuthenticatedTransport {
    pub fn new(
        http: Client,
        base_url: &str,
        auth_prefix: &str,
        store: Arc<TokenStore>,
        refresher: RefreshCoordinator,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let base_path = Url::parse(&base_url)
            .map(|u| u.path().trim_end_matches('/').to_owned())
            .unwrap_or_default();
        Self {
            http,
            auth_path: format!("{base_path}{auth_prefix}"),
            base_url,
            store,
            refresher,
            proactive_refresh: true,
        }
    }

    /// Refresh an expired token before sending instead of waiting for a 401.
    pub fn with_proactive_refresh(mut self, enabled: bool) -> Self {
        self.proactive_refresh = enabled;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Build and send a request.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response, SessionError> {
        self.send(builder.build()?).await
    }

    /// Send a request, refreshing and retrying once on 401.
    ///
    /// Responses other than 401 are returned unchanged, whatever their
    /// status. A 401 from an auth endpoint is returned unchanged too.
    pub async fn send(&self, request: Request) -> Result<Response, SessionError> {
        let exempt = self.is_auth_endpoint(request.url());
        let retried = is_retry(&request);

        if !exempt && !retried && self.proactive_refresh {
            self.refresh_if_expired().await?;
        }

        // Cloned before decoration so the retry gets the refreshed token.
        let template = if exempt || retried { None } else { request.try_clone() };
        let (request, sent_token) = self.decorate(request);
        let path = request.url().path().to_owned();

        let response = self.http.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || exempt {
            return Ok(response);
        }
        if retried {
            warn!(path = %path, "request still unauthorized after token refresh");
            return Err(SessionError::Unauthorized);
        }
        let Some(mut retry) = template else {
            warn!(path = %path, "request body cannot be replayed, not refreshing");
            return Err(SessionError::Unauthorized);
        };

        debug!(path = %path, "request unauthorized, refreshing token");
        let pair = self.refresher.refresh_or_join(sent_token.as_deref()).await?;

        set_bearer(&mut retry, &pair.access_token)?;
        retry.headers_mut().insert(RETRY_MARKER_HEADER, HeaderValue::from_static("true"));

        let response = self.http.execute(retry).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %path, "request still unauthorized after token refresh");
            return Err(SessionError::Unauthorized);
        }
        Ok(response)
    }

    /// Whether `url` falls under the auth prefix, below the base URL's path.
    pub fn is_auth_endpoint(&self, url: &Url) -> bool {
        path_has_prefix(url.path(), &self.auth_path)
    }

    /// Attach the stored bearer token unless the request targets an auth
    /// endpoint. Returns the token that was attached.
    pub(crate) fn decorate(&self, mut request: Request) -> (Request, Option<String>) {
        if self.is_auth_endpoint(request.url()) {
            return (request, None);
        }
        let Some(token) = self.store.access_token() else {
            return (request, None);
        };
        match set_bearer(&mut request, &token) {
            Ok(()) => (request, Some(token)),
            Err(e) => {
                warn!(err = %e, "stored access token is not a valid header value");
                (request, None)
            }
        }
    }

    async fn refresh_if_expired(&self) -> Result<(), SessionError> {
        let Some(current) = self.store.access_token() else {
            return Ok(());
        };
        if !self.store.is_expired() {
            return Ok(());
        }
        debug!("access token expired, refreshing before send");
        self.refresher.refresh_or_join(Some(&current)).await?;
        Ok(())
    }
}

/// True for the post-refresh retry of a request.
pub fn is_retry(request: &Request) -> bool {
    request
        .headers()
        .get(RETRY_MARKER_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Prefix match on the path. The trailing slash of `prefix` is optional in
/// `path`, so `/auth` matches `/auth/` but `/authors` does not.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if path.starts_with(prefix) {
        return true;
    }
    let bare = prefix.trim_end_matches('/');
    !bare.is_empty() && path == bare
}

/// A token that cannot be sent as a header is as good as no token.
fn set_bearer(request: &mut Request, token: &str) -> Result<(), SessionError> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| SessionError::Unauthorized)?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
