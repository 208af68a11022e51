//! In-process token store.

use std::sync::RwLock;

use super::{CredentialPair, TokenStore};
use crate::error::BookingClientError;
use crate::Result;

/// Thread-safe in-memory credential storage.
///
/// Lives only as long as the process; useful for tests and for embedding
/// the client where persistence is handled elsewhere.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `pair`.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let pair = self
            .pair
            .read()
            .map_err(|_| BookingClientError::LockPoisoned)?;
        Ok(pair.clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let mut slot = self
            .pair
            .write()
            .map_err(|_| BookingClientError::LockPoisoned)?;
        *slot = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .pair
            .write()
            .map_err(|_| BookingClientError::LockPoisoned)?;
        *slot = None;
        Ok(())
    }

    // Read-modify-write under one write lock.
    fn replace_access_token(
        &self,
        sent_refresh: &str,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<Option<CredentialPair>> {
        let mut slot = self
            .pair
            .write()
            .map_err(|_| BookingClientError::LockPoisoned)?;

        let next = slot
            .as_ref()
            .and_then(|current| current.refreshed_from(sent_refresh, access_token, refresh_token));
        if next.is_some() {
            *slot = next;
        }
        // Superseded or empty: report what is stored now
        Ok(slot.clone())
    }
}
