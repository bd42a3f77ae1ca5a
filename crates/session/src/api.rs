// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the backend's auth endpoints.
//!
//! These calls bypass the authenticated transport: the transport never
//! decorates auth-prefixed paths, and a 401 from them is never refreshed.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RefreshError, SessionError};

/// Endpoint names, relative to the auth prefix (`/auth/` by default).
pub const SOCIAL_LOGIN: &str = "social-login";
pub const REISSUE: &str = "reissue";
pub const LOGOUT: &str = "logout";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SocialLoginRequest<'a> {
    id_token: &'a str,
    locale: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReissueRequest<'a> {
    refresh_token: &'a str,
}

/// Tokens issued by social login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Anything else the backend returns (new-user flags and the like).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tokens issued by a reissue call. The backend may keep the old refresh
/// token, in which case it omits `refreshToken`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// HTTP client for `/auth/*`.
pub struct AuthApi {
    base_url: String,
    auth_prefix: String,
    http: Client,
}

impl AuthApi {
    pub fn new(base_url: &str, auth_prefix: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth_prefix: auth_prefix.to_owned(),
            http,
        }
    }

    /// Full URL of an auth endpoint.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}{}", self.base_url, self.auth_prefix, endpoint)
    }

    /// Exchange a federated identity token for a token pair.
    pub async fn social_login(
        &self,
        id_token: &str,
        locale: &str,
    ) -> Result<LoginResponse, SessionError> {
        let resp = self
            .http
            .post(self.url(SOCIAL_LOGIN))
            .json(&SocialLoginRequest { id_token, locale })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SessionError::LoginFailed { status: status.as_u16(), message });
        }

        resp.json::<LoginResponse>()
            .await
            .map_err(|e| SessionError::InvalidResponse(format!("social login: {e}")))
    }

    /// Trade a refresh token for a new pair.
    pub async fn reissue(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        let resp = self
            .http
            .post(self.url(REISSUE))
            .json(&ReissueRequest { refresh_token })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected { status: status.as_u16(), body });
        }

        let bytes = resp.bytes().await.map_err(|e| RefreshError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| RefreshError::InvalidResponse(e.to_string()))
    }

    /// Ask the backend to revoke the session. The caller decides what to do
    /// with a failure; local state is not touched here.
    pub async fn logout(&self, access_token: Option<&str>) -> Result<(), SessionError> {
        let mut req = self.http.delete(self.url(LOGOUT));
        if let Some(token) = access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::UnexpectedStatus {
                path: format!("{}{LOGOUT}", self.auth_prefix),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
