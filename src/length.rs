//! Standalone length counter with additive conflict resolution.
//!
//! Walking a bucket chain to count entries is linear, so applications that
//! need cheap sizes keep one of these next to the tree and adjust it as they
//! mutate. Because increments commute, concurrent adjustments resolve by
//! applying both deltas to the shared base.

use crate::error::{Result, TreeError};
use crate::persist::{self, HookRef};

/// Persistent entry counter.
#[derive(Default)]
pub struct Length {
    value: i64,
    hook: HookRef,
}

impl Length {
    /// Counter starting at `value`.
    pub fn new(value: i64) -> Self {
        Length { value, hook: None }
    }

    /// Current value.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Replace the value.
    pub fn set(&mut self, value: i64) {
        self.value = value;
        persist::mark_changed(&self.hook);
    }

    /// Add `delta` to the value.
    pub fn change(&mut self, delta: i64) -> Result<()> {
        self.value = self
            .value
            .checked_add(delta)
            .ok_or(TreeError::Range("length counter overflows"))?;
        persist::mark_changed(&self.hook);
        Ok(())
    }

    /// Snapshot for storage.
    pub fn export_state(&self) -> i64 {
        self.value
    }

    /// Restore from a snapshot.
    pub fn import_state(&mut self, value: i64) {
        self.value = value;
    }

    /// Merge two divergent counters by applying both deltas to the shared
    /// base: `committed + new - old`.
    pub fn resolve_conflict(old: i64, committed: i64, new: i64) -> Result<i64> {
        committed
            .checked_add(new)
            .and_then(|sum| sum.checked_sub(old))
            .ok_or(TreeError::Range("length counter overflows"))
    }

    /// Attach or clear the persistence capability.
    pub fn set_hook(&mut self, hook: HookRef) {
        self.hook = hook;
    }
}

impl std::fmt::Debug for Length {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Length").field(&self.value).finish()
    }
}
