use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, warn};

use super::token::AuthToken;
use crate::error::AuthError;

/// Storage abstraction for persisted provider tokens.
///
/// Reads never fail: a missing or unreadable store behaves as empty so a
/// corrupted cache cannot block re-authentication. Writes propagate errors.
pub trait TokenStore: Send + Sync {
    fn save(&self, token: &AuthToken) -> Result<(), AuthError>;
    fn load(&self, provider: &str) -> Option<AuthToken>;
    fn delete(&self, provider: &str) -> Result<bool, AuthError>;
    fn list_all(&self) -> BTreeSet<String>;
    fn clear_all(&self) -> Result<(), AuthError>;

    /// The stored token, unless it is missing or expired.
    fn get_valid_token(&self, provider: &str) -> Option<AuthToken> {
        self.load(provider).filter(|token| !token.is_expired())
    }

    fn has_valid_token(&self, provider: &str) -> bool {
        self.get_valid_token(provider).is_some()
    }
}

/// Token store backed by one JSON object keyed by provider name.
///
/// Every write rewrites the whole file atomically and restricts it to the
/// owner. There is no cross-process lock: two processes saving at the same
/// time can lose one of the updates.
///
/// # Example
/// ```no_run
/// use ai_auth::auth::{AuthToken, FileTokenStore, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// store.save(&AuthToken::new("poe", "sk-example-key"))?;
/// assert!(store.list_all().contains("poe"));
/// # Ok::<(), ai_auth::error::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn new_default() -> Self {
        Self::new(crate::config::default_token_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents, one JSON value per provider.
    ///
    /// Entries are kept as values so a record this crate cannot parse still
    /// survives a rewrite of the file.
    fn read_entries(&self) -> BTreeMap<String, Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "token file unreadable; treating as empty");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "token file malformed; treating as empty");
                BTreeMap::new()
            }
        }
    }

    fn load_all(&self) -> BTreeMap<String, AuthToken> {
        self.read_entries()
            .into_iter()
            .filter_map(|(provider, value)| match serde_json::from_value::<AuthToken>(value) {
                Ok(token) => Some((provider, token)),
                Err(err) => {
                    warn!(provider = %provider, error = %err, "skipping malformed token entry");
                    None
                }
            })
            .collect()
    }

    fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), AuthError> {
        let serialized = serde_json::to_vec_pretty(entries)
            .map_err(|err| AuthError::Storage(format!("failed to encode tokens: {err}")))?;
        atomic_write(&self.path, &serialized)
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, token: &AuthToken) -> Result<(), AuthError> {
        let record = serde_json::to_value(token)
            .map_err(|err| AuthError::Storage(format!("failed to encode token: {err}")))?;
        let mut entries = self.read_entries();
        entries.insert(token.provider.clone(), record);
        self.write_entries(&entries)?;
        debug!(provider = %token.provider, "token saved");
        Ok(())
    }

    fn load(&self, provider: &str) -> Option<AuthToken> {
        self.load_all().remove(provider)
    }

    fn delete(&self, provider: &str) -> Result<bool, AuthError> {
        let mut entries = self.read_entries();
        if entries.remove(provider).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries)?;
        Ok(true)
    }

    fn list_all(&self) -> BTreeSet<String> {
        self.load_all().into_keys().collect()
    }

    fn clear_all(&self) -> Result<(), AuthError> {
        self.write_entries(&BTreeMap::new())
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Storage(format!("token path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
