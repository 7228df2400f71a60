//! Three-way merge of leaf snapshots.
//!
//! Given the state a transaction started from (`old`), the state another
//! transaction committed meanwhile (`committed`), and the state the current
//! transaction wants to write (`new`), the resolver replays both sides'
//! edits against `old` and produces a combined leaf. Edits that cannot be
//! ordered safely reject with a [`ConflictError`] carrying a stable reason
//! code and the one-based cursor positions at the point of failure.
//!
//! The walk advances three cursors in key order. At each step the smallest
//! outstanding key decides the case: a key present in all three states must
//! carry an unchanged value on at least one side; a key missing from one
//! side is an insert or a delete depending on whether `old` has it; and both
//! sides deleting or inserting the same key rejects, since the merged value
//! cannot be chosen. Structural edits reject up front: a changed successor
//! link means a split or chain splice happened, and an emptied side means
//! the leaf is about to be unlinked by its parent.

use crate::codec::{KeyCodec, ValueCodec};
use crate::error::{ConflictError, ConflictReason};
use crate::state::LeafState;

struct Cursor<'a, K, V> {
    entries: std::slice::Iter<'a, (K, V)>,
    item: Option<&'a (K, V)>,
    /// One-based position of `item`; -1 once exhausted.
    position: i64,
}

impl<'a, K, V> Cursor<'a, K, V> {
    fn new(state: Option<&'a LeafState<K, V>>) -> Self {
        let entries: &'a [(K, V)] = state.map_or(&[], |state| state.entries.as_slice());
        let mut cursor = Cursor {
            entries: entries.iter(),
            item: None,
            position: 0,
        };
        cursor.advance();
        cursor
    }

    fn advance(&mut self) {
        self.item = self.entries.next();
        if self.item.is_some() {
            self.position += 1;
        } else {
            self.position = -1;
        }
    }

    fn active(&self) -> bool {
        self.item.is_some()
    }

    fn take_into(&mut self, out: &mut Vec<(K, V)>)
    where
        K: Clone,
        V: Clone,
    {
        if let Some((key, value)) = self.item {
            out.push((key.clone(), value.clone()));
        }
        self.advance();
    }
}

fn rejected<K, V>(
    old: &Cursor<'_, K, V>,
    committed: &Cursor<'_, K, V>,
    new: &Cursor<'_, K, V>,
    reason: ConflictReason,
) -> ConflictError {
    let err = ConflictError::new(old.position, committed.position, new.position, reason);
    tracing::debug!(
        target: "bosque::resolve",
        reason = reason.code(),
        old = old.position,
        committed = committed.position,
        new = new.position,
        "three-way merge rejected"
    );
    err
}

fn rejected_early(reason: ConflictReason) -> ConflictError {
    tracing::debug!(target: "bosque::resolve", reason = reason.code(), "three-way merge rejected");
    ConflictError::new(-1, -1, -1, reason)
}

/// Merge `committed` and `new` against their shared base `old`. An absent
/// state reads as an empty leaf. The merged leaf keeps `old`'s successor
/// token.
pub(crate) fn resolve_leaf<C: KeyCodec, D: ValueCodec>(
    old: Option<&LeafState<C::Key, D::Value>>,
    committed: Option<&LeafState<C::Key, D::Value>>,
    new: Option<&LeafState<C::Key, D::Value>>,
) -> Result<LeafState<C::Key, D::Value>, ConflictError> {
    use std::cmp::Ordering;

    let old_next = old.and_then(|state| state.next);
    let committed_next = committed.and_then(|state| state.next);
    let new_next = new.and_then(|state| state.next);
    if committed_next != old_next || new_next != old_next {
        return Err(rejected_early(ConflictReason::NextChanged));
    }

    let committed_empty = committed.map_or(true, |state| state.entries.is_empty());
    let new_empty = new.map_or(true, |state| state.entries.is_empty());
    if committed_empty || new_empty {
        return Err(rejected_early(ConflictReason::EmptySide));
    }

    let mut i_old = Cursor::new(old);
    let mut i_com = Cursor::new(committed);
    let mut i_new = Cursor::new(new);
    let mut result: Vec<(C::Key, D::Value)> = Vec::new();

    while let (Some((k_old, v_old)), Some((k_com, v_com)), Some((k_new, v_new))) =
        (i_old.item, i_com.item, i_new.item)
    {
        let cmp_oc = C::compare(k_old, k_com);
        let cmp_on = C::compare(k_old, k_new);
        if cmp_oc == Ordering::Equal {
            if cmp_on == Ordering::Equal {
                // Key present on all sides: at most one side may have
                // changed its value.
                if v_com == v_old {
                    result.push((k_old.clone(), v_new.clone()));
                } else if v_new == v_old {
                    result.push((k_old.clone(), v_com.clone()));
                } else {
                    return Err(rejected(&i_old, &i_com, &i_new, ConflictReason::ValueConflict));
                }
                i_old.advance();
                i_com.advance();
                i_new.advance();
            } else if cmp_on == Ordering::Greater {
                i_new.take_into(&mut result);
            } else if v_old == v_com {
                // The new side deleted this key. Losing the first entry
                // would rewrite the parent's separator, which the merged
                // leaf alone cannot express.
                if i_new.position == 1 {
                    return Err(rejected(
                        &i_old,
                        &i_com,
                        &i_new,
                        ConflictReason::FirstEntryDeleted,
                    ));
                }
                i_old.advance();
                i_com.advance();
            } else {
                return Err(rejected(
                    &i_old,
                    &i_com,
                    &i_new,
                    ConflictReason::NewDeletedChangedKey,
                ));
            }
        } else if cmp_on == Ordering::Equal {
            if cmp_oc == Ordering::Greater {
                i_com.take_into(&mut result);
            } else if v_old == v_new {
                if i_com.position == 1 {
                    return Err(rejected(
                        &i_old,
                        &i_com,
                        &i_new,
                        ConflictReason::FirstEntryDeleted,
                    ));
                }
                i_old.advance();
                i_new.advance();
            } else {
                return Err(rejected(
                    &i_old,
                    &i_com,
                    &i_new,
                    ConflictReason::CommittedDeletedChangedKey,
                ));
            }
        } else {
            let cmp_cn = C::compare(k_com, k_new);
            if cmp_cn == Ordering::Equal {
                return Err(rejected(&i_old, &i_com, &i_new, ConflictReason::DuelingInsert));
            }
            if cmp_oc == Ordering::Greater {
                if cmp_cn == Ordering::Greater {
                    i_new.take_into(&mut result);
                } else {
                    i_com.take_into(&mut result);
                }
            } else if cmp_on == Ordering::Greater {
                i_new.take_into(&mut result);
            } else {
                return Err(rejected(&i_old, &i_com, &i_new, ConflictReason::SharedDelete));
            }
        }
    }

    // Base exhausted: both remaining runs must be pure inserts.
    while let (Some((k_com, _)), Some((k_new, _))) = (i_com.item, i_new.item) {
        match C::compare(k_com, k_new) {
            Ordering::Equal => {
                return Err(rejected(
                    &i_old,
                    &i_com,
                    &i_new,
                    ConflictReason::TrailingDuelingInsert,
                ))
            }
            Ordering::Greater => i_new.take_into(&mut result),
            Ordering::Less => i_com.take_into(&mut result),
        }
    }

    // New side exhausted: it deleted the rest of the base.
    while let (Some((k_old, v_old)), Some((k_com, v_com))) = (i_old.item, i_com.item) {
        match C::compare(k_old, k_com) {
            Ordering::Greater => i_com.take_into(&mut result),
            Ordering::Equal if v_old == v_com => {
                i_old.advance();
                i_com.advance();
            }
            _ => {
                return Err(rejected(
                    &i_old,
                    &i_com,
                    &i_new,
                    ConflictReason::NewDeleteMismatch,
                ))
            }
        }
    }

    // Committed side exhausted: it deleted the rest of the base.
    while let (Some((k_old, v_old)), Some((k_new, v_new))) = (i_old.item, i_new.item) {
        match C::compare(k_old, k_new) {
            Ordering::Greater => i_new.take_into(&mut result),
            Ordering::Equal if v_old == v_new => {
                i_old.advance();
                i_new.advance();
            }
            _ => {
                return Err(rejected(
                    &i_old,
                    &i_com,
                    &i_new,
                    ConflictReason::CommittedDeleteMismatch,
                ))
            }
        }
    }

    if i_old.active() {
        return Err(rejected(
            &i_old,
            &i_com,
            &i_new,
            ConflictReason::TrailingSharedDelete,
        ));
    }

    while i_com.active() {
        i_com.take_into(&mut result);
    }
    while i_new.active() {
        i_new.take_into(&mut result);
    }

    if result.is_empty() {
        // An empty merged leaf cannot be unlinked from its parent here.
        return Err(rejected(&i_old, &i_com, &i_new, ConflictReason::EmptyResult));
    }

    tracing::trace!(
        target: "bosque::resolve",
        merged = result.len(),
        "three-way merge succeeded"
    );
    Ok(LeafState {
        entries: result,
        next: old_next,
    })
}
