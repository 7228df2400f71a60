//! Flat leaf containers.
//!
//! A bucket is a pair of parallel sorted arrays plus a non-owning link to the
//! next bucket at the same level. Trees build every leaf out of them;
//! [`Bucket`] and [`Set`] expose the same node as standalone containers.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Index;
use std::rc::{Rc, Weak};

use crate::codec::{KeyCodec, ValueCodec};
use crate::error::{ConflictError, Result, TreeError};
use crate::families::Unit;
use crate::persist::{self, HookRef, Oid};
use crate::range::RangeSpec;
use crate::resolve;
use crate::state::{LeafState, SetState};

/// What a bucket-level store did.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SetOutcome<V> {
    /// Key present and left alone: if-absent store, or equal-value skip.
    Unchanged(V),
    /// Key present; value overwritten. Carries the previous value.
    Replaced(V),
    /// Key absent; the node gained an entry.
    Grew,
}

impl<V> SetOutcome<V> {
    /// Whether the store mutated the node at all.
    pub(crate) fn changed(&self) -> bool {
        !matches!(self, SetOutcome::Unchanged(_))
    }
}

pub(crate) type BucketRef<C, D> = Rc<RefCell<BucketNode<C, D>>>;
pub(crate) type WeakBucketRef<C, D> = Weak<RefCell<BucketNode<C, D>>>;

/// The shared leaf node. Key order is strictly increasing per the codec;
/// `values` always parallels `keys` (a `Vec<()>` for set kinds).
pub(crate) struct BucketNode<C: KeyCodec, D: ValueCodec> {
    pub(crate) keys: Vec<C::Key>,
    pub(crate) values: Vec<D::Value>,
    pub(crate) next: Option<WeakBucketRef<C, D>>,
    pub(crate) hook: HookRef,
}

impl<C: KeyCodec, D: ValueCodec> BucketNode<C, D> {
    pub(crate) fn new() -> Self {
        BucketNode {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
            hook: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Binary search returning the index on a hit and `-(insertion + 1)` on
    /// a miss, so one probe serves lookup, store, and range seeding.
    pub(crate) fn search(&self, key: &C::Key) -> isize {
        let mut low = 0usize;
        let mut high = self.keys.len();
        while low < high {
            let mid = (low + high) / 2;
            match C::compare(&self.keys[mid], key) {
                Ordering::Equal => return mid as isize,
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
            }
        }
        -(low as isize) - 1
    }

    pub(crate) fn contains(&self, key: &C::Key) -> bool {
        self.search(key) >= 0
    }

    pub(crate) fn min_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        let bound = match bound {
            None => return self.keys.first().cloned().ok_or(TreeError::NotFound),
            Some(bound) => bound,
        };
        let index = self.search(bound);
        if index >= 0 {
            return Ok(bound.clone());
        }
        let insertion = (-index - 1) as usize;
        self.keys.get(insertion).cloned().ok_or(TreeError::NotFound)
    }

    pub(crate) fn max_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        let bound = match bound {
            None => return self.keys.last().cloned().ok_or(TreeError::NotFound),
            Some(bound) => bound,
        };
        let index = self.search(bound);
        if index >= 0 {
            return Ok(bound.clone());
        }
        let insertion = (-index - 1) as usize;
        if insertion > 0 {
            Ok(self.keys[insertion - 1].clone())
        } else {
            Err(TreeError::NotFound)
        }
    }

    /// Index window selected by a range filter, clamped to the current
    /// length. An exclusion flag without a bound still drops the
    /// corresponding extreme slot.
    pub(crate) fn range_window(&self, range: &RangeSpec<C::Key>) -> (usize, usize) {
        let len = self.keys.len() as isize;
        let start = match &range.min {
            None => {
                if range.exclude_min {
                    1
                } else {
                    0
                }
            }
            Some(min) => {
                let index = self.search(min);
                if index >= 0 {
                    if range.exclude_min {
                        index + 1
                    } else {
                        index
                    }
                } else {
                    -index - 1
                }
            }
        };
        let end = match &range.max {
            None => {
                if range.exclude_max {
                    len - 1
                } else {
                    len
                }
            }
            Some(max) => {
                let index = self.search(max);
                if index >= 0 {
                    if range.exclude_max {
                        index
                    } else {
                        index + 1
                    }
                } else {
                    -index - 1
                }
            }
        };
        let start = start.clamp(0, len);
        let end = end.clamp(start, len);
        (start as usize, end as usize)
    }

    pub(crate) fn set(
        &mut self,
        key: C::Key,
        value: D::Value,
        if_absent: bool,
    ) -> SetOutcome<D::Value> {
        let index = self.search(&key);
        if index >= 0 {
            let index = index as usize;
            if if_absent || (D::SAME_CHECK && value == self.values[index]) {
                return SetOutcome::Unchanged(self.values[index].clone());
            }
            persist::mark_changed(&self.hook);
            let previous = std::mem::replace(&mut self.values[index], value);
            SetOutcome::Replaced(previous)
        } else {
            persist::mark_changed(&self.hook);
            let index = (-index - 1) as usize;
            self.keys.insert(index, key);
            self.values.insert(index, value);
            SetOutcome::Grew
        }
    }

    pub(crate) fn delete(&mut self, key: &C::Key) -> Result<D::Value> {
        let index = self.search(key);
        if index < 0 {
            return Err(TreeError::NotFound);
        }
        persist::mark_changed(&self.hook);
        let index = index as usize;
        self.keys.remove(index);
        Ok(self.values.remove(index))
    }

    /// Splice the successor out of the chain in O(1).
    pub(crate) fn delete_next_bucket(&mut self) {
        if let Some(weak) = self.next.take() {
            if let Some(next) = weak.upgrade() {
                persist::mark_changed(&self.hook);
                self.next = next.borrow().next.clone();
            }
        }
    }

    pub(crate) fn next_ref(&self) -> Option<BucketRef<C, D>> {
        self.next.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn next_oid(&self) -> Option<Oid> {
        let next = self.next_ref()?;
        let oid = persist::oid_of(&next.borrow().hook);
        oid
    }

    pub(crate) fn clear(&mut self) {
        persist::mark_changed(&self.hook);
        self.keys.clear();
        self.values.clear();
        self.next = None;
    }

    pub(crate) fn export_state(&self) -> LeafState<C::Key, D::Value> {
        LeafState {
            entries: self
                .keys
                .iter()
                .cloned()
                .zip(self.values.iter().cloned())
                .collect(),
            next: self.next_oid(),
        }
    }

    /// Replace content from a snapshot. The successor token cannot be
    /// resolved to a live bucket here; chain links are the importer's job.
    pub(crate) fn import_entries(&mut self, state: LeafState<C::Key, D::Value>) {
        let (keys, values) = state.entries.into_iter().unzip();
        self.keys = keys;
        self.values = values;
        self.next = None;
    }
}

/// Move the tail of `this` into a fresh bucket, default split point in the
/// middle. The new bucket inherits the old successor link and `this` points
/// at the new bucket.
pub(crate) fn split_bucket<C: KeyCodec, D: ValueCodec>(
    this: &BucketRef<C, D>,
    at: Option<usize>,
) -> BucketRef<C, D> {
    let mut node = this.borrow_mut();
    let index = match at {
        Some(index) if index < node.keys.len() => index,
        _ => node.keys.len() / 2,
    };
    let keys = node.keys.split_off(index);
    let values = node.values.split_off(index);
    let next = node.next.take();
    persist::mark_changed(&node.hook);
    let new = Rc::new(RefCell::new(BucketNode {
        keys,
        values,
        next,
        hook: None,
    }));
    node.next = Some(Rc::downgrade(&new));
    new
}

/// Flat sorted mapping.
///
/// The leaf kind as a standalone container: everything lives in one node, so
/// lookups return references and mutation never allocates tree structure.
pub struct Bucket<C: KeyCodec, D: ValueCodec> {
    node: BucketNode<C, D>,
}

impl<C: KeyCodec, D: ValueCodec> Bucket<C, D> {
    /// Empty bucket.
    pub fn new() -> Self {
        Bucket {
            node: BucketNode::new(),
        }
    }

    pub(crate) fn from_sorted_entries(entries: Vec<(C::Key, D::Value)>) -> Self {
        let (keys, values) = entries.into_iter().unzip();
        Bucket {
            node: BucketNode {
                keys,
                values,
                next: None,
                hook: None,
            },
        }
    }

    pub(crate) fn node(&self) -> &BucketNode<C, D> {
        &self.node
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.node.len()
    }

    /// Whether the bucket has no entries.
    pub fn is_empty(&self) -> bool {
        self.node.len() == 0
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &C::Key) -> bool {
        self.node.contains(key)
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &C::Key) -> Option<&D::Value> {
        let index = self.node.search(key);
        if index >= 0 {
            Some(&self.node.values[index as usize])
        } else {
            None
        }
    }

    /// Store `value` under `key`, returning the previous value if the key
    /// was present.
    pub fn insert(&mut self, key: C::Key, value: D::Value) -> Option<D::Value> {
        match self.node.set(key, value, false) {
            SetOutcome::Unchanged(previous) | SetOutcome::Replaced(previous) => Some(previous),
            SetOutcome::Grew => None,
        }
    }

    /// Store only when the key is absent; reports whether a store happened.
    pub fn insert_if_absent(&mut self, key: C::Key, value: D::Value) -> bool {
        matches!(self.node.set(key, value, true), SetOutcome::Grew)
    }

    /// The resident value, storing `value` first when the key was absent.
    pub fn get_or_insert(&mut self, key: C::Key, value: D::Value) -> D::Value {
        match self.node.set(key, value.clone(), true) {
            SetOutcome::Unchanged(existing) => existing,
            _ => value,
        }
    }

    /// Remove `key`, returning its value. Fails with not-found on a miss.
    pub fn remove(&mut self, key: &C::Key) -> Result<D::Value> {
        self.node.delete(key)
    }

    /// Remove and return the smallest entry.
    pub fn pop_first(&mut self) -> Option<(C::Key, D::Value)> {
        if self.node.keys.is_empty() {
            return None;
        }
        persist::mark_changed(&self.node.hook);
        let key = self.node.keys.remove(0);
        let value = self.node.values.remove(0);
        Some((key, value))
    }

    /// Store every pair in order.
    pub fn update<I: IntoIterator<Item = (C::Key, D::Value)>>(&mut self, pairs: I) {
        for (key, value) in pairs {
            self.node.set(key, value, false);
        }
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.node.clear();
    }

    /// Smallest key, or smallest key `>= bound`.
    pub fn min_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        self.node.min_key(bound)
    }

    /// Largest key, or largest key `<= bound`.
    pub fn max_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        self.node.max_key(bound)
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&C::Key, &D::Value)> + '_ {
        self.node.keys.iter().zip(self.node.values.iter())
    }

    /// All keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &C::Key> + '_ {
        self.node.keys.iter()
    }

    /// All values in key order.
    pub fn values(&self) -> impl Iterator<Item = &D::Value> + '_ {
        self.node.values.iter()
    }

    /// Entries whose keys fall inside `range`.
    pub fn range(&self, range: &RangeSpec<C::Key>) -> impl Iterator<Item = (&C::Key, &D::Value)> + '_ {
        let (start, end) = self.node.range_window(range);
        self.node.keys[start..end]
            .iter()
            .zip(self.node.values[start..end].iter())
    }

    /// Snapshot of content and successor token.
    pub fn export_state(&self) -> LeafState<C::Key, D::Value> {
        self.node.export_state()
    }

    /// Replace content from a snapshot.
    pub fn import_state(&mut self, state: LeafState<C::Key, D::Value>) {
        self.node.import_entries(state);
    }

    /// Three-way merge of bucket states; an absent state reads as empty.
    /// Both sides' edits against `old` combine when they can be ordered
    /// safely; otherwise the error names the rejection reason.
    pub fn resolve_conflict(
        old: Option<&LeafState<C::Key, D::Value>>,
        committed: Option<&LeafState<C::Key, D::Value>>,
        new: Option<&LeafState<C::Key, D::Value>>,
    ) -> std::result::Result<LeafState<C::Key, D::Value>, ConflictError> {
        resolve::resolve_leaf::<C, D>(old, committed, new)
    }

    /// Attach or clear the persistence capability.
    pub fn set_hook(&mut self, hook: HookRef) {
        self.node.hook = hook;
    }
}

impl<C: KeyCodec, D: ValueCodec> Default for Bucket<C, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: KeyCodec, D: ValueCodec> FromIterator<(C::Key, D::Value)> for Bucket<C, D> {
    fn from_iter<I: IntoIterator<Item = (C::Key, D::Value)>>(iter: I) -> Self {
        let mut bucket = Bucket::new();
        bucket.update(iter);
        bucket
    }
}

impl<C: KeyCodec, D: ValueCodec> fmt::Debug for Bucket<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Flat sorted set: a bucket without values, indexable by position.
pub struct Set<C: KeyCodec> {
    node: BucketNode<C, Unit>,
}

impl<C: KeyCodec> Set<C> {
    /// Empty set.
    pub fn new() -> Self {
        Set {
            node: BucketNode::new(),
        }
    }

    /// One-key set; the representation of a bare key in multiunion input.
    pub fn singleton(key: C::Key) -> Self {
        Set {
            node: BucketNode {
                keys: vec![key],
                values: vec![()],
                next: None,
                hook: None,
            },
        }
    }

    pub(crate) fn from_sorted_keys(keys: Vec<C::Key>) -> Self {
        let values = vec![(); keys.len()];
        Set {
            node: BucketNode {
                keys,
                values,
                next: None,
                hook: None,
            },
        }
    }

    pub(crate) fn node(&self) -> &BucketNode<C, Unit> {
        &self.node
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.node.len()
    }

    /// Whether the set has no keys.
    pub fn is_empty(&self) -> bool {
        self.node.len() == 0
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &C::Key) -> bool {
        self.node.contains(key)
    }

    /// Add `key`; reports whether it was newly added.
    pub fn insert(&mut self, key: C::Key) -> bool {
        matches!(self.node.set(key, (), false), SetOutcome::Grew)
    }

    /// Remove `key`. Fails with not-found on a miss.
    pub fn remove(&mut self, key: &C::Key) -> Result<()> {
        self.node.delete(key).map(|_| ())
    }

    /// Remove `key` if present; reports whether it was there.
    pub fn discard(&mut self, key: &C::Key) -> bool {
        self.node.delete(key).is_ok()
    }

    /// Remove and return the smallest key.
    pub fn pop_first(&mut self) -> Option<C::Key> {
        if self.node.keys.is_empty() {
            return None;
        }
        persist::mark_changed(&self.node.hook);
        self.node.values.pop();
        Some(self.node.keys.remove(0))
    }

    /// Add every key in order.
    pub fn update<I: IntoIterator<Item = C::Key>>(&mut self, keys: I) {
        for key in keys {
            self.node.set(key, (), false);
        }
    }

    /// Drop all keys.
    pub fn clear(&mut self) {
        self.node.clear();
    }

    /// Smallest key, or smallest key `>= bound`.
    pub fn min_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        self.node.min_key(bound)
    }

    /// Largest key, or largest key `<= bound`.
    pub fn max_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        self.node.max_key(bound)
    }

    /// All keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &C::Key> + '_ {
        self.node.keys.iter()
    }

    /// Keys inside `range`.
    pub fn range(&self, range: &RangeSpec<C::Key>) -> impl Iterator<Item = &C::Key> + '_ {
        let (start, end) = self.node.range_window(range);
        self.node.keys[start..end].iter()
    }

    /// Whether the two sets share no key.
    pub fn is_disjoint(&self, other: &Set<C>) -> bool {
        let a = &self.node.keys;
        let b = &other.node.keys;
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match C::compare(&a[i], &b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => return false,
            }
        }
        true
    }

    /// Snapshot of keys and successor token.
    pub fn export_state(&self) -> SetState<C::Key> {
        SetState {
            keys: self.node.keys.clone(),
            next: self.node.next_oid(),
        }
    }

    /// Replace content from a snapshot.
    pub fn import_state(&mut self, state: SetState<C::Key>) {
        self.node.keys = state.keys;
        self.node.values = vec![(); self.node.keys.len()];
        self.node.next = None;
    }

    /// Three-way merge of set states; an absent state reads as empty.
    pub fn resolve_conflict(
        old: Option<&SetState<C::Key>>,
        committed: Option<&SetState<C::Key>>,
        new: Option<&SetState<C::Key>>,
    ) -> std::result::Result<SetState<C::Key>, ConflictError> {
        let old = old.map(|state| LeafState::from(state.clone()));
        let committed = committed.map(|state| LeafState::from(state.clone()));
        let new = new.map(|state| LeafState::from(state.clone()));
        resolve::resolve_leaf::<C, Unit>(old.as_ref(), committed.as_ref(), new.as_ref())
            .map(SetState::from)
    }

    /// Attach or clear the persistence capability.
    pub fn set_hook(&mut self, hook: HookRef) {
        self.node.hook = hook;
    }
}

impl<C: KeyCodec> Default for Set<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: KeyCodec> FromIterator<C::Key> for Set<C> {
    fn from_iter<I: IntoIterator<Item = C::Key>>(iter: I) -> Self {
        let mut set = Set::new();
        set.update(iter);
        set
    }
}

impl<C: KeyCodec> Index<usize> for Set<C> {
    type Output = C::Key;

    fn index(&self, position: usize) -> &C::Key {
        &self.node.keys[position]
    }
}

impl<C: KeyCodec> fmt::Debug for Set<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
