//! Durable credential storage.
//!
//! The access and refresh tokens are always stored together as a
//! [`CredentialPair`]; a store either holds a complete pair or nothing.
//! Every writer replaces the whole pair so a request can never observe a
//! half-refreshed credential.

mod file;
mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use crate::Result;

/// Access token and refresh token issued together by the backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Longer-lived credential used only to obtain a new access token.
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Pair produced by a successful refresh.
    ///
    /// The refresh token is replaced only when the backend rotated it.
    pub fn refreshed(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
        }
    }

    /// Like [`refreshed`](Self::refreshed), but only if this pair still
    /// holds `sent_refresh`, the refresh token the refresh was made with.
    ///
    /// `None` means the pair was replaced (a new login) while the refresh
    /// was on the wire and must be left alone.
    pub fn refreshed_from(
        &self,
        sent_refresh: &str,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Option<Self> {
        if self.refresh_token != sent_refresh {
            return None;
        }
        Some(self.refreshed(access_token, refresh_token))
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Storage backend for the credential pair.
///
/// Implementations must be safe to share between concurrently running
/// requests.
pub trait TokenStore: Send + Sync {
    /// Read the stored pair, if any.
    fn load(&self) -> Result<Option<CredentialPair>>;

    /// Replace the stored pair.
    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove both tokens.
    fn clear(&self) -> Result<()>;

    /// Current access token.
    fn access_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|pair| pair.access_token))
    }

    /// Current refresh token.
    fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|pair| pair.refresh_token))
    }

    /// Install a refreshed access token, keeping or rotating the refresh token.
    ///
    /// The write happens only while the stored pair still carries
    /// `sent_refresh`. Returns the pair stored afterwards: the refreshed one,
    /// or the newer pair that superseded the refresh. `None` when nothing
    /// is stored (the session was cleared while the refresh was on the wire).
    fn replace_access_token(
        &self,
        sent_refresh: &str,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<Option<CredentialPair>> {
        let Some(current) = self.load()? else {
            return Ok(None);
        };
        match current.refreshed_from(sent_refresh, access_token, refresh_token) {
            Some(next) => {
                self.save(&next)?;
                Ok(Some(next))
            }
            None => Ok(Some(current)),
        }
    }
}
