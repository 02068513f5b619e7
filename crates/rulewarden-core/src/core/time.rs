// crates/rulewarden-core/src/core/time.rs
// ============================================================================
// Module: Rulewarden Time Model
// Description: Canonical timestamp representation for rows and logs.
// Purpose: Provide explicit, comparable time values across Rulewarden records.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! Rulewarden stamps every row with unix-millisecond timestamps supplied by
//! callers. Engine operations never read the wall clock themselves; only
//! host-edge components (the scheduler worker) call [`Timestamp::now`], which
//! keeps the core paths deterministic and replayable in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix-epoch millisecond timestamp used in Rulewarden rows and logs.
///
/// # Invariants
/// - Values are explicitly provided by callers on engine operations.
/// - Ordering follows the underlying millisecond value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix-epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix-epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time.
    ///
    /// Reserved for host-edge components; engine operations take explicit
    /// timestamps instead.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns this timestamp advanced by the given milliseconds, saturating.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
