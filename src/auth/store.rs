use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::TokenPair;

/// Storage abstraction for a cached token pair, keyed by client id.
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing is stored; `CorruptedCacheFile` when the entry
    /// exists but cannot be decoded.
    fn load(&self, name: &str) -> Result<Option<TokenPair>, AuthError>;
    fn save(&self, name: &str, token: &TokenPair) -> Result<(), AuthError>;
    fn exists(&self, name: &str) -> bool;
    fn remove(&self, name: &str) -> Result<(), AuthError>;
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_token_dir()
    }
}

/// File-backed token store writing one TOML file per client id.
///
/// Concurrent writers are not coordinated; the last write wins.
///
/// # Example
/// ```no_run
/// use zcrm_auth::auth::{FileTokenStore, TokenPair, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let pair = TokenPair::issued("access", "refresh", "Bearer", 3600);
/// store.save("1000.CLIENT", &pair)?;
/// # Ok::<(), zcrm_auth::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_token_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file holding `name`'s token pair.
    pub fn token_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.toml", normalize_label(name)))
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, name: &str) -> Result<Option<TokenPair>, AuthError> {
        let path = self.token_path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: TokenFile =
            toml::from_str(&raw).map_err(|err| AuthError::CorruptedCacheFile {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        Ok(Some(file.token))
    }

    fn save(&self, name: &str, token: &TokenPair) -> Result<(), AuthError> {
        let path = self.token_path(name);
        Self::ensure_parent(&path)?;
        let file = TokenFile {
            version: 1,
            name: name.to_string(),
            saved_at: Utc::now(),
            token: token.clone(),
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        tracing::debug!(path = %path.display(), "Saved token cache");
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.token_path(name).is_file()
    }

    fn remove(&self, name: &str) -> Result<(), AuthError> {
        let path = self.token_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    name: String,
    saved_at: DateTime<Utc>,
    token: TokenPair,
}

fn default_token_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "zoho", "zcrm-auth")
        .map(|dirs| dirs.data_local_dir().join("tokens"))
        .unwrap_or_else(|| PathBuf::from(".zcrm").join("tokens"))
}

fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' || ch == '_' {
            out.push(ch);
        } else {
            out.push('-');
        }
    }
    if out.trim_matches(|c| c == '-' || c == '.').is_empty() {
        "default".to_string()
    } else {
        out
    }
}
