// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::token::DEFAULT_EXPIRY_BUFFER_SECS;

/// Configuration for the authenticated session client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the REST backend.
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "RECIPE_API_BASE_URL")]
    pub base_url: String,

    /// Path prefix of auth endpoints. Requests under it are never decorated
    /// with a bearer token and never trigger a refresh.
    #[arg(long, default_value = "/auth/", env = "RECIPE_AUTH_PREFIX")]
    pub auth_prefix: String,

    /// Locale sent with social login.
    #[arg(long, default_value = "en", env = "RECIPE_LOCALE")]
    pub locale: String,

    /// Timeout for every HTTP call, refresh included, in milliseconds.
    #[arg(long, default_value_t = 10000, env = "RECIPE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// JSON file to persist tokens in. In-memory only if unset.
    #[arg(long, env = "RECIPE_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Seconds before expiry at which an access token counts as expired.
    #[arg(long, default_value_t = DEFAULT_EXPIRY_BUFFER_SECS, env = "RECIPE_EXPIRY_BUFFER_SECS")]
    pub expiry_buffer_secs: u64,

    /// Extra attempts for a refresh call that fails at the transport level.
    #[arg(long, default_value_t = 0, env = "RECIPE_REFRESH_RETRIES")]
    pub refresh_retries: u32,

    /// Do not refresh an expired token before sending a request.
    #[arg(long, env = "RECIPE_NO_PROACTIVE_REFRESH")]
    pub no_proactive_refresh: bool,

    /// Refresh an expired access token during the initial session check.
    #[arg(long, env = "RECIPE_REFRESH_ON_STARTUP")]
    pub refresh_on_startup: bool,
}

impl ClientConfig {
    /// Config pointing at `base_url` with every other field at its default.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_prefix: "/auth/".into(),
            locale: "en".into(),
            request_timeout_ms: 10000,
            token_file: None,
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
            refresh_retries: 0,
            no_proactive_refresh: false,
            refresh_on_startup: false,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid --base-url {:?}: {e}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("--base-url must be http or https, got {}", url.scheme());
        }
        if !self.auth_prefix.starts_with('/') || !self.auth_prefix.ends_with('/') {
            anyhow::bail!("--auth-prefix must start and end with '/', got {:?}", self.auth_prefix);
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn proactive_refresh(&self) -> bool {
        !self.no_proactive_refresh
    }
}

/// Resolve the state directory for the CLI's token file.
///
/// Checks `RECIPE_STATE_DIR`, then `$XDG_STATE_HOME/recipe-session`,
/// then `$HOME/.local/state/recipe-session`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RECIPE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("recipe-session");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/recipe-session");
    }
    PathBuf::from(".recipe-session")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
