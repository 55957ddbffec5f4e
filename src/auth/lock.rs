//! Per-session refresh serialization
//!
//! Parallel requests of one user share a session.  Without coordination two
//! of them can both see an expired token and both spend the refresh token;
//! with rotating refresh tokens the slower writer then stores a credential
//! the provider has already invalidated.  [`SessionLocks`] hands out one
//! async mutex per session identity so that only one refresh runs at a time
//! per session, and later arrivals observe its result.
//!
//! Entries are held weakly and pruned once no request holds or awaits them.
//! [`SessionLocks::global`] is the process-wide registry every
//! [`TokenManager`](crate::auth::manager::TokenManager) uses unless told
//! otherwise.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-session async locks.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl SessionLocks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by the whole process.
    pub fn global() -> Arc<SessionLocks> {
        static GLOBAL: OnceLock<Arc<SessionLocks>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SessionLocks::new())))
    }

    /// Waits for exclusive access to `session_id`.
    ///
    /// The lock is released when the returned guard is dropped, including
    /// when the awaiting task is cancelled.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);

            match locks.get(session_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(session_id.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
