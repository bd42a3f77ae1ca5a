// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide session state broadcast.
//!
//! Backed by a `watch` channel: subscribers see every change, and a late
//! subscriber immediately sees the latest value. Nothing moves the state
//! back to [`SessionState::Unknown`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::token::{TokenEvent, TokenStore};

/// The signed-in user, as returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authentication state as seen by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Not yet resolved; only valid before the initial check.
    Unknown,
    Authenticated(Profile),
    Unauthenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Self::Authenticated(p) => Some(p),
            _ => None,
        }
    }
}

/// Observable holder of the current [`SessionState`].
#[derive(Clone)]
pub struct SessionObserver {
    state_tx: Arc<watch::Sender<SessionState>>,
}

impl SessionObserver {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unknown);
        Self { state_tx: Arc::new(state_tx) }
    }

    pub fn current(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// The state as a stream that yields the current value first.
    pub fn stream(&self) -> WatchStream<SessionState> {
        WatchStream::new(self.state_tx.subscribe())
    }

    pub(crate) fn set_authenticated(&self, profile: Profile) {
        self.set(SessionState::Authenticated(profile));
    }

    pub(crate) fn set_unauthenticated(&self) {
        self.set(SessionState::Unauthenticated);
    }

    fn set(&self, next: SessionState) {
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(prev = state_name(state), next = state_name(&next), "session state transition");
            *state = next;
            true
        });
    }

    /// Follow token clears made outside the refresh path (another handle
    /// clearing the shared store, for instance).
    ///
    /// Clears seen before the initial check are ignored so that only the
    /// initial check resolves `Unknown`. A clear that has since been
    /// followed by a save is stale and ignored too.
    pub fn spawn_token_listener(
        &self,
        store: &Arc<TokenStore>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let observer = self.clone();
        let mut rx = store.subscribe();
        let store = Arc::downgrade(store);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(TokenEvent::Cleared) => {
                        let Some(store) = store.upgrade() else { break };
                        if store.snapshot().is_some() {
                            debug!("ignoring stale token clear");
                            continue;
                        }
                        if observer.current() != SessionState::Unknown {
                            observer.set_unauthenticated();
                        }
                    }
                    Ok(TokenEvent::Saved { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for SessionObserver {
    fn default() -> Self {
        Self::new()
    }
}

fn state_name(state: &SessionState) -> &'static str {
    match state {
        SessionState::Unknown => "unknown",
        SessionState::Authenticated(_) => "authenticated",
        SessionState::Unauthenticated => "unauthenticated",
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
