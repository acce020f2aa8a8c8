//! In-memory session credentials backed by the vault.
//!
//! The token pair is updated atomically: login and a successful refresh
//! replace both tokens together, logout and a failed refresh clear both.
//! Readers can never observe a half-updated pair. Every change is mirrored
//! into the vault (obfuscated) so a restarted console resumes the session.

use parking_lot::RwLock;
use tracing::debug;

use fluxgate_common::Vault;
use fluxgate_domain::{TokenPair, TokenResponse};

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Holds the operator's token pair, persisting it through a [`Vault`].
pub struct SessionStore {
    vault: Vault,
    tokens: RwLock<Option<TokenPair>>,
}

impl SessionStore {
    /// Wrap a vault, resuming any persisted session.
    #[must_use]
    pub fn new(vault: Vault) -> Self {
        let access: Option<String> = vault.get(ACCESS_TOKEN_KEY);
        let tokens = access.map(|access_token| TokenPair {
            access_token,
            refresh_token: vault.get(REFRESH_TOKEN_KEY),
        });

        if tokens.is_some() {
            debug!("resumed persisted session");
        }

        Self { vault, tokens: RwLock::new(tokens) }
    }

    /// Current access token, if signed in.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.tokens.read().as_ref().map(|pair| pair.access_token.clone())
    }

    /// Current refresh token, if one was issued.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.read().as_ref().and_then(|pair| pair.refresh_token.clone())
    }

    /// Whether an access token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.read().is_some()
    }

    /// Replace the pair (login or refresh success).
    pub fn store(&self, pair: TokenPair) {
        self.vault.set(ACCESS_TOKEN_KEY, &pair.access_token, true);
        match &pair.refresh_token {
            Some(token) => {
                self.vault.set(REFRESH_TOKEN_KEY, token, true);
            }
            None => {
                self.vault.remove(REFRESH_TOKEN_KEY);
            }
        }
        *self.tokens.write() = Some(pair);
    }

    /// Merge a refresh response into the current pair and store the result.
    ///
    /// Returns the merged pair. When no pair exists (logged out mid-refresh)
    /// the response is treated as a fresh pair.
    pub fn apply_refresh(&self, response: &TokenResponse) -> TokenPair {
        let merged = {
            let current = self.tokens.read();
            match current.as_ref() {
                Some(pair) => pair.merged_with(response),
                None => TokenPair::from(response.clone()),
            }
        };
        self.store(merged.clone());
        merged
    }

    /// Drop the pair from memory and from the vault (logout, refresh failure).
    ///
    /// Only the token keys are removed; other persisted settings survive.
    pub fn clear(&self) {
        *self.tokens.write() = None;
        self.vault.remove(ACCESS_TOKEN_KEY);
        self.vault.remove(REFRESH_TOKEN_KEY);
    }
}
