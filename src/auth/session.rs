//! Per-user session storage
//!
//! The token manager keeps no token state of its own.  Everything it reads
//! and writes lives in a [`SessionStore`] scoped to one authenticated user
//! session.  Two implementations ship with the crate:
//!
//! - [`MemorySession`] -- a mutex-guarded map, for embedding and tests.
//! - [`JsonFileSession`] -- a JSON object on disk, used by the CLI.
//!
//! Store methods are synchronous.  The manager never awaits between the
//! individual writes of one token set, and [`SessionStore::set_many`] applies
//! a whole set under a single lock, so a cancelled request cannot leave a
//! half-written token set behind.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::{OidcLoginError, Result};

// ---------------------------------------------------------------------------
// SessionKey
// ---------------------------------------------------------------------------

/// Session fields owned by the token lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Current bearer credential.
    AccessToken,
    /// Refresh credential; absence means "not authenticated".
    RefreshToken,
    /// Absolute expiry of the access token, seconds since the epoch.
    AccessTokenExpiresAt,
    /// Cached provider end-session URL.
    LogoutUrl,
    /// Last ID token issued by the provider, used as `id_token_hint`.
    IdToken,
}

impl SessionKey {
    /// All keys, in storage order.
    pub const ALL: [SessionKey; 5] = [
        SessionKey::AccessToken,
        SessionKey::RefreshToken,
        SessionKey::AccessTokenExpiresAt,
        SessionKey::LogoutUrl,
        SessionKey::IdToken,
    ];

    /// Storage name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::AccessToken => "oidc_access_token",
            SessionKey::RefreshToken => "oidc_refresh_token",
            SessionKey::AccessTokenExpiresAt => "oidc_access_token_expires_at",
            SessionKey::LogoutUrl => "oidc_logout_url",
            SessionKey::IdToken => "oidc_id_token",
        }
    }

    /// Looks a key up by its storage name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Key/value storage bound to one authenticated user session.
pub trait SessionStore: Send + Sync {
    /// Stable identity of the session; concurrent refreshes are serialized
    /// per identity.
    fn id(&self) -> &str;

    /// Returns the value stored under `key`.
    fn get(&self, key: SessionKey) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: SessionKey, value: String);

    /// Stores all entries as one unit.
    ///
    /// The default writes entries one by one.  Stores shared between threads
    /// override it so that readers never observe a subset of the entries.
    fn set_many(&self, entries: Vec<(SessionKey, String)>) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the guard cannot leave a map half-updated: every
    // mutation is a single insert or a batch applied in one critical section.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemorySession
// ---------------------------------------------------------------------------

/// In-memory session store.
///
/// # Examples
///
/// ```
/// use oidc_login::auth::session::{MemorySession, SessionKey, SessionStore};
///
/// let session = MemorySession::new("sess-1");
/// session.set(SessionKey::RefreshToken, "R1".to_string());
/// assert_eq!(session.get(SessionKey::RefreshToken).as_deref(), Some("R1"));
/// assert_eq!(session.get(SessionKey::AccessToken), None);
/// ```
#[derive(Debug, Default)]
pub struct MemorySession {
    id: String,
    values: Mutex<HashMap<SessionKey, String>>,
}

impl MemorySession {
    /// Creates an empty session with the given identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a session pre-populated with `values`.
    pub fn with_values<I>(id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (SessionKey, String)>,
    {
        Self {
            id: id.into(),
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    /// Returns a copy of every stored field.
    pub fn snapshot(&self) -> HashMap<SessionKey, String> {
        lock(&self.values).clone()
    }
}

impl SessionStore for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: SessionKey) -> Option<String> {
        lock(&self.values).get(&key).cloned()
    }

    fn set(&self, key: SessionKey, value: String) {
        lock(&self.values).insert(key, value);
    }

    fn set_many(&self, entries: Vec<(SessionKey, String)>) {
        let mut values = lock(&self.values);
        values.extend(entries);
    }
}

// ---------------------------------------------------------------------------
// JsonFileSession
// ---------------------------------------------------------------------------

/// Session persisted as a flat JSON object.
///
/// The file is read once by [`load`](Self::load); reads and writes then go to
/// memory until [`flush`](Self::flush) writes the object back.  Keys that do
/// not belong to the token lifecycle are preserved untouched.
#[derive(Debug)]
pub struct JsonFileSession {
    id: String,
    path: PathBuf,
    values: Mutex<BTreeMap<String, serde_json::Value>>,
    dirty: AtomicBool,
}

impl JsonFileSession {
    /// Reads the session file at `path`.
    ///
    /// The session identity is the `session_id` field when present, otherwise
    /// the file stem.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or is
    /// not a JSON object.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            OidcLoginError::Session(format!("failed to read {}: {e}", path.display()))
        })?;
        let values: BTreeMap<String, serde_json::Value> = serde_json::from_str(&contents)
            .map_err(|e| {
                OidcLoginError::Session(format!(
                    "{} is not a JSON object: {e}",
                    path.display()
                ))
            })?;

        let id = values
            .get("session_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "default".to_string());

        Ok(Self {
            id,
            path,
            values: Mutex::new(values),
            dirty: AtomicBool::new(false),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any value was written since the last load or flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Writes the session back to disk.
    ///
    /// The object is written to a sibling temporary file and renamed over the
    /// original so that readers never see a truncated file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem operation fails.
    pub fn flush(&self) -> Result<()> {
        let json = {
            let values = lock(&self.values);
            serde_json::to_string_pretty(&*values)?
        };
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        self.dirty.store(false, Ordering::SeqCst);
        tracing::debug!(path = %self.path.display(), "Session flushed");
        Ok(())
    }
}

/// Expiry timestamps are kept as JSON numbers; everything else as strings.
fn json_value(key: SessionKey, value: String) -> serde_json::Value {
    if key == SessionKey::AccessTokenExpiresAt {
        if let Ok(timestamp) = value.trim().parse::<i64>() {
            return serde_json::Value::from(timestamp);
        }
    }
    serde_json::Value::String(value)
}

impl SessionStore for JsonFileSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: SessionKey) -> Option<String> {
        match lock(&self.values).get(key.as_str())? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn set(&self, key: SessionKey, value: String) {
        lock(&self.values).insert(key.as_str().to_string(), json_value(key, value));
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn set_many(&self, entries: Vec<(SessionKey, String)>) {
        let mut values = lock(&self.values);
        for (key, value) in entries {
            values.insert(key.as_str().to_string(), json_value(key, value));
        }
        self.dirty.store(true, Ordering::SeqCst);
    }
}
