// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token storage: the single access/refresh pair shared by every request.
//!
//! The pair lives behind one lock so readers never see an access token from
//! one save paired with a refresh token from another. Every `save`/`clear`
//! is broadcast as a [`TokenEvent`] so the session observer can follow auth
//! changes without polling.

pub mod persist;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::Clock;

/// Seconds before `expires_at` at which a token already counts as expired.
pub const DEFAULT_EXPIRY_BUFFER_SECS: u64 = 60;

/// An access/refresh token pair with its expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch seconds.
    pub expires_at: u64,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Events broadcast by the token store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Saved { expires_at: u64 },
    Cleared,
}

/// Holds the current token pair.
pub struct TokenStore {
    pair: RwLock<Option<TokenPair>>,
    clock: Arc<dyn Clock>,
    expiry_buffer_secs: u64,
    persist_path: Option<PathBuf>,
    event_tx: broadcast::Sender<TokenEvent>,
}

impl TokenStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            pair: RwLock::new(None),
            clock,
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
            persist_path: None,
            event_tx,
        }
    }

    /// Persist the pair to `path` on every save and remove it on clear.
    pub fn persist_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    pub fn with_expiry_buffer(mut self, secs: u64) -> Self {
        self.expiry_buffer_secs = secs;
        self
    }

    /// Seed the store from the token file, if one is configured.
    ///
    /// Returns whether a pair was loaded. Unreadable files are logged and
    /// skipped; the store stays empty.
    pub fn load_persisted(&self) -> bool {
        let Some(ref path) = self.persist_path else {
            return false;
        };
        match persist::load(path) {
            Ok(Some(pair)) => {
                info!(path = %path.display(), expires_at = pair.expires_at, "loaded persisted tokens");
                *self.pair.write() = Some(pair);
                true
            }
            Ok(None) => {
                debug!(path = %path.display(), "no persisted tokens");
                false
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to load persisted tokens: {e}");
                false
            }
        }
    }

    /// Store a new pair, replacing both tokens at once.
    pub fn save(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: u64,
    ) -> TokenPair {
        let pair = TokenPair {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: self.clock.now_secs().saturating_add(expires_in_secs),
        };
        {
            let mut slot = self.pair.write();
            *slot = Some(pair.clone());
            // Written under the lock so the file matches the last save.
            if let Some(ref path) = self.persist_path {
                if let Err(e) = persist::save(path, &pair) {
                    warn!(path = %path.display(), "failed to persist tokens: {e}");
                }
            }
        }
        debug!(expires_at = pair.expires_at, "tokens saved");
        let _ = self.event_tx.send(TokenEvent::Saved { expires_at: pair.expires_at });
        pair
    }

    /// Remove all token state.
    pub fn clear(&self) {
        {
            let mut slot = self.pair.write();
            *slot = None;
            if let Some(ref path) = self.persist_path {
                if let Err(e) = persist::remove(path) {
                    warn!(path = %path.display(), "failed to remove token file: {e}");
                }
            }
        }
        debug!("tokens cleared");
        let _ = self.event_tx.send(TokenEvent::Cleared);
    }

    /// The whole pair, read atomically.
    pub fn snapshot(&self) -> Option<TokenPair> {
        self.pair.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.pair.read().as_ref().map(|p| p.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.pair.read().as_ref().map(|p| p.refresh_token.clone())
    }

    /// True once `now + buffer >= expires_at`, or when nothing is stored.
    pub fn is_expired(&self) -> bool {
        match self.pair.read().as_ref() {
            Some(pair) => {
                self.clock.now_secs().saturating_add(self.expiry_buffer_secs) >= pair.expires_at
            }
            None => true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some() && !self.is_expired()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
