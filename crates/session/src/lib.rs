// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod api;
pub mod client;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod refresh;
pub mod session;
pub mod token;
pub mod transport;

pub use client::SessionClient;
pub use config::ClientConfig;
pub use error::{ErrorCode, RefreshError, SessionError};
pub use session::{Profile, SessionObserver, SessionState};
pub use token::{TokenPair, TokenStore};
pub use transport::AuthenticatedTransport;

static CRYPTO_INIT: std::sync::Once = std::sync::Once::new();

/// Install the ring crypto provider for reqwest/rustls. Only the first call
/// has any effect.
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
