// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes surfaced to callers and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    RefreshFailed,
    Network,
    LoginFailed,
    UnexpectedStatus,
    InvalidResponse,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::Network => "NETWORK",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::UnexpectedStatus => "UNEXPECTED_STATUS",
            Self::InvalidResponse => "INVALID_RESPONSE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed token refresh.
///
/// `Clone` because every caller joined to the same in-flight refresh
/// receives the same result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("refresh request failed: {0}")]
    Network(String),
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),
    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

impl RefreshError {
    /// Transport-level failures leave the stored tokens untouched.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Errors returned by the session client and authenticated transport.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No usable token, or the request still got 401 after one refresh.
    #[error("unauthorized")]
    Unauthorized,

    #[error("token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend rejected the federated credential exchange.
    #[error("login failed ({status}): {message}")]
    LoginFailed { status: u16, message: String },

    #[error("unexpected response from {path} ({status}): {body}")]
    UnexpectedStatus { path: String, status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::RefreshFailed(e) if e.is_transient() => ErrorCode::Network,
            Self::RefreshFailed(_) => ErrorCode::RefreshFailed,
            Self::Network(_) => ErrorCode::Network,
            Self::LoginFailed { .. } => ErrorCode::LoginFailed,
            Self::UnexpectedStatus { .. } => ErrorCode::UnexpectedStatus,
            Self::InvalidResponse(_) => ErrorCode::InvalidResponse,
        }
    }

    /// True when the user has to sign in again rather than retry.
    pub fn requires_reauth(&self) -> bool {
        matches!(self.code(), ErrorCode::Unauthorized | ErrorCode::RefreshFailed)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::RefreshFailed(e) => e.is_transient(),
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
