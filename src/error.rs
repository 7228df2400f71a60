//! Error taxonomy for tree operations, codec validation, and state merging.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors raised by containers, codecs, and state import.
///
/// Every variant is raised before the target node is mutated; a failed
/// operation leaves the container exactly as it was.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Input failed codec validation, or a snapshot had the wrong shape.
    #[error("type error: {0}")]
    Type(&'static str),
    /// Numeric input or weighted arithmetic fell outside the family domain.
    #[error("value out of range: {0}")]
    Range(&'static str),
    /// Lookup miss, or no key satisfies the requested bound.
    #[error("not found")]
    NotFound,
    /// A structural invariant does not hold.
    #[error("corrupt structure: {0}")]
    Corruption(&'static str),
    /// Three-way state merge failed; see the embedded reason.
    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

/// Why a three-way merge of node states was rejected.
///
/// The discriminants are stable and part of the public contract: persistence
/// layers log and test against them, so they are never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConflictReason {
    /// Committed or new changed the successor link; the chain topology moved.
    NextChanged = 0,
    /// Both sides changed the same key's value, to different values.
    ValueConflict = 1,
    /// New deleted a key whose value committed had changed.
    NewDeletedChangedKey = 2,
    /// Committed deleted a key whose value new had changed.
    CommittedDeletedChangedKey = 3,
    /// Both sides inserted the same key.
    DuelingInsert = 4,
    /// Both sides deleted the same key.
    SharedDelete = 5,
    /// Both sides appended the same key past old's end.
    TrailingDuelingInsert = 6,
    /// New deleted the rest of old, but committed changed part of it.
    NewDeleteMismatch = 7,
    /// Committed deleted the rest of old, but new changed part of it.
    CommittedDeleteMismatch = 8,
    /// Both sides deleted trailing entries; old ended with entries unclaimed.
    TrailingSharedDelete = 9,
    /// The merged bucket came out empty; unlinking it is the parent's job.
    EmptyResult = 10,
    /// A tree state was not in the degenerate single-bucket form.
    NestedTree = 11,
    /// Committed or new is empty; the leaf is about to be unlinked.
    EmptySide = 12,
    /// A side deleted the first entry of the bucket, which would rewrite the
    /// parent's separator.
    FirstEntryDeleted = 13,
}

impl ConflictReason {
    /// Stable numeric code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Short human-readable description used in error messages.
    pub const fn describe(self) -> &'static str {
        match self {
            ConflictReason::NextChanged => "bucket successor link changed",
            ConflictReason::ValueConflict => "conflicting value changes for one key",
            ConflictReason::NewDeletedChangedKey => "new deleted a key committed changed",
            ConflictReason::CommittedDeletedChangedKey => "committed deleted a key new changed",
            ConflictReason::DuelingInsert => "both sides inserted the same key",
            ConflictReason::SharedDelete => "both sides deleted the same key",
            ConflictReason::TrailingDuelingInsert => "both sides appended the same key",
            ConflictReason::NewDeleteMismatch => "new deleted entries committed changed",
            ConflictReason::CommittedDeleteMismatch => "committed deleted entries new changed",
            ConflictReason::TrailingSharedDelete => "both sides deleted trailing entries",
            ConflictReason::EmptyResult => "merge produced an empty bucket",
            ConflictReason::NestedTree => "tree state has more than one bucket",
            ConflictReason::EmptySide => "committed or new state is empty",
            ConflictReason::FirstEntryDeleted => "first entry of the bucket was deleted",
        }
    }
}

/// Unresolvable divergence between old, committed, and new states.
///
/// Positions are 1-based cursor positions into the respective states at the
/// moment the merge gave up; -1 means that cursor was already exhausted (or
/// the failure predates the walk, as with [`ConflictReason::NextChanged`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "cannot merge states (reason {code}: {desc}; positions old={old}, committed={com}, new={new})",
    code = .reason.code(),
    desc = .reason.describe(),
    old = .old_position,
    com = .committed_position,
    new = .new_position,
)]
pub struct ConflictError {
    /// Cursor position in the old state.
    pub old_position: i64,
    /// Cursor position in the committed state.
    pub committed_position: i64,
    /// Cursor position in the new state.
    pub new_position: i64,
    /// Stable rejection reason.
    pub reason: ConflictReason,
}

impl ConflictError {
    /// Build an error from the three cursor positions and a reason.
    pub fn new(old: i64, committed: i64, new: i64, reason: ConflictReason) -> Self {
        ConflictError {
            old_position: old,
            committed_position: committed,
            new_position: new,
            reason,
        }
    }
}
