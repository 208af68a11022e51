//! JSON file token store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CredentialPair, TokenStore};
use crate::error::BookingClientError;
use crate::Result;

/// Credential storage persisted to a JSON file.
///
/// The file holds `{"access_token": ..., "refresh_token": ...}` and is
/// created with owner-only permissions on Unix. Clearing the store removes
/// the file, so a missing file means "no session".
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Create a store backed by `path`. The file is not touched until the
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_pair(&self) -> Result<Option<CredentialPair>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BookingClientError::Io(e)),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            BookingClientError::Storage(format!(
                "corrupt token file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_pair(&self, pair: &CredentialPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(pair)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(&self.path, &contents)?;
        }

        tracing::debug!(path = %self.path.display(), "Token file written");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        self.read_pair()
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BookingClientError::LockPoisoned)?;
        self.write_pair(pair)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BookingClientError::LockPoisoned)?;

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Token file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BookingClientError::Io(e)),
        }
    }

    fn replace_access_token(
        &self,
        sent_refresh: &str,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<Option<CredentialPair>> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BookingClientError::LockPoisoned)?;

        let Some(current) = self.read_pair()? else {
            return Ok(None);
        };
        match current.refreshed_from(sent_refresh, access_token, refresh_token) {
            Some(next) => {
                self.write_pair(&next)?;
                Ok(Some(next))
            }
            None => Ok(Some(current)),
        }
    }
}
