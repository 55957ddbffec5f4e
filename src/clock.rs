//! Clock port for expiry arithmetic
//!
//! Token expiry is stored as whole seconds since the Unix epoch, so the port
//! hands out `i64` timestamps rather than `DateTime` values.

use chrono::Utc;

/// Source of the current time.
///
/// Injected into the token manager so that expiry decisions can be tested
/// against a fixed instant.
pub trait Clock: Send + Sync {
    /// Returns the current time as seconds since the Unix epoch.
    fn now(&self) -> i64;
}

/// System clock backed by [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock frozen at a fixed instant.
///
/// # Examples
///
/// ```
/// use oidc_login::clock::{Clock, FixedClock};
///
/// let clock = FixedClock(1_700_000_000);
/// assert_eq!(clock.now(), 1_700_000_000);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}
