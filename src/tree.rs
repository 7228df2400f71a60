//! B-tree mapping and set containers over chained bucket leaves.
//!
//! Interior nodes hold N children and N-1 separator keys; `keys[i]` is the
//! least key of `children[i + 1]`'s subtree. Children are homogeneous per
//! node. Leaves are [`BucketNode`]s chained left-to-right across subtree
//! boundaries, and every interior node caches a weak reference to the first
//! bucket of its subtree so range scans never revisit the interior.
//!
//! Nodes split only when an insert pushes them past the configured capacity;
//! deletion never rebalances, it only drops emptied children and repairs the
//! separator, chain, and firstbucket bookkeeping around them.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::bucket::{split_bucket, BucketNode, BucketRef, SetOutcome, WeakBucketRef};
use crate::codec::{KeyCodec, TreeConfig, ValueCodec};
use crate::error::{ConflictError, ConflictReason, Result, TreeError};
use crate::families::Unit;
use crate::persist::{self, HookRef};
use crate::range::{RangeItems, RangeKeys, RangeSpec, RangeValues};
use crate::resolve;
use crate::state::{ChildState, LeafState, TreeState};

type TreeRef<C, D> = Rc<RefCell<TreeNode<C, D>>>;

enum Child<C: KeyCodec, D: ValueCodec> {
    Inner(TreeRef<C, D>),
    Leaf(BucketRef<C, D>),
}

impl<C: KeyCodec, D: ValueCodec> Child<C, D> {
    fn is_leaf(&self) -> bool {
        matches!(self, Child::Leaf(_))
    }

    /// Child count for interior nodes, entry count for leaves.
    fn size(&self) -> usize {
        match self {
            Child::Inner(node) => node.borrow().children.len(),
            Child::Leaf(bucket) => bucket.borrow().len(),
        }
    }

    /// Least key of the child's subtree, through the firstbucket cache.
    fn min_key(&self) -> Option<C::Key> {
        match self {
            Child::Leaf(bucket) => bucket.borrow().keys.first().cloned(),
            Child::Inner(node) => {
                let bucket = node.borrow().firstbucket.as_ref()?.upgrade()?;
                let key = bucket.borrow().keys.first().cloned();
                key
            }
        }
    }

    fn firstbucket(&self) -> Option<WeakBucketRef<C, D>> {
        match self {
            Child::Leaf(bucket) => Some(Rc::downgrade(bucket)),
            Child::Inner(node) => node.borrow().firstbucket.clone(),
        }
    }
}

/// Splice out the bucket following the rightmost bucket of `child`'s subtree.
fn splice_after_rightmost<C: KeyCodec, D: ValueCodec>(child: &Child<C, D>) {
    match child {
        Child::Leaf(bucket) => bucket.borrow_mut().delete_next_bucket(),
        Child::Inner(node) => {
            let node = node.borrow();
            if let Some(last) = node.children.last() {
                splice_after_rightmost(last);
            }
        }
    }
}

struct TreeNode<C: KeyCodec, D: ValueCodec> {
    /// Separators; `keys.len() + 1 == children.len()` whenever non-empty.
    keys: Vec<C::Key>,
    children: Vec<Child<C, D>>,
    firstbucket: Option<WeakBucketRef<C, D>>,
    hook: HookRef,
}

impl<C: KeyCodec, D: ValueCodec> TreeNode<C, D> {
    fn new() -> Self {
        TreeNode {
            keys: Vec::new(),
            children: Vec::new(),
            firstbucket: None,
            hook: None,
        }
    }

    /// The unique child whose subtree may contain `key`. Biased toward the
    /// middle so the common deep-descent case probes few separators.
    /// Callers guarantee the node is non-empty.
    fn child_index(&self, key: &C::Key) -> usize {
        let mut lo = 0usize;
        let mut hi = self.children.len();
        let mut i = hi / 2;
        while i > lo {
            match C::compare(&self.keys[i - 1], key) {
                Ordering::Less => lo = i,
                Ordering::Greater => hi = i,
                Ordering::Equal => return i,
            }
            i = (lo + hi) / 2;
        }
        i
    }

    /// A one-bucket tree inlines its bucket's state, so when that bucket has
    /// no identity of its own a change inside it must dirty the tree.
    fn redirect_single_bucket_mark(&self) {
        if self.children.len() != 1 {
            return;
        }
        if let Child::Leaf(bucket) = &self.children[0] {
            if persist::oid_of(&bucket.borrow().hook).is_none() {
                persist::mark_changed(&self.hook);
            }
        }
    }

    fn set_in(
        &mut self,
        key: C::Key,
        value: D::Value,
        if_absent: bool,
        config: &TreeConfig,
    ) -> Result<SetOutcome<D::Value>> {
        persist::read_current(&self.hook)?;
        let index = if self.children.is_empty() {
            let bucket = Rc::new(RefCell::new(BucketNode::new()));
            self.firstbucket = Some(Rc::downgrade(&bucket));
            self.children.push(Child::Leaf(bucket));
            0
        } else {
            self.child_index(&key)
        };
        let outcome = match &self.children[index] {
            Child::Inner(child) => child.borrow_mut().set_in(key, value, if_absent, config)?,
            Child::Leaf(bucket) => bucket.borrow_mut().set(key, value, if_absent),
        };
        if matches!(outcome, SetOutcome::Grew) {
            let (size, max_size) = match &self.children[index] {
                Child::Inner(child) => (child.borrow().children.len(), config.max_internal_size),
                Child::Leaf(bucket) => (bucket.borrow().len(), config.max_leaf_size),
            };
            if size > max_size {
                self.grow(index, config)?;
            }
        }
        if outcome.changed() {
            self.redirect_single_bucket_mark();
        }
        Ok(outcome)
    }

    /// Split the overfull child at `index` and wire its new right sibling in,
    /// keyed by the sibling's least key.
    fn grow(&mut self, index: usize, config: &TreeConfig) -> Result<()> {
        persist::mark_changed(&self.hook);
        tracing::trace!(
            target: "bosque::tree",
            index,
            children = self.children.len(),
            "splitting overfull child"
        );
        let new_child = match &self.children[index] {
            Child::Inner(child) => Child::Inner(split_tree(child, None)),
            Child::Leaf(bucket) => Child::Leaf(split_bucket(bucket, None)),
        };
        let separator = new_child
            .min_key()
            .ok_or(TreeError::Corruption("split produced an empty sibling"))?;
        self.keys.insert(index, separator);
        self.children.insert(index + 1, new_child);
        if self.children.len() >= config.max_internal_size * 2 {
            self.split_root(config)?;
        }
        Ok(())
    }

    /// Wrap the node's entire content in a fresh child and re-split, keeping
    /// the root's identity.
    fn split_root(&mut self, config: &TreeConfig) -> Result<()> {
        tracing::trace!(
            target: "bosque::tree",
            children = self.children.len(),
            "splitting root in place"
        );
        let child = TreeNode {
            keys: std::mem::take(&mut self.keys),
            children: std::mem::take(&mut self.children),
            firstbucket: self.firstbucket.clone(),
            hook: None,
        };
        self.children.push(Child::Inner(Rc::new(RefCell::new(child))));
        self.grow(0, config)
    }

    fn del_in(&mut self, key: &C::Key) -> Result<(bool, D::Value)> {
        persist::read_current(&self.hook)?;
        if self.children.is_empty() {
            return Err(TreeError::NotFound);
        }
        let index = self.child_index(key);
        let (mut removed_first_bucket, value) = match &self.children[index] {
            Child::Inner(child) => child.borrow_mut().del_in(key)?,
            Child::Leaf(bucket) => (false, bucket.borrow_mut().delete(key)?),
        };

        self.redirect_single_bucket_mark();

        // The deleted key was the separator for this child: the child's new
        // least key takes its place. The first child has no separator.
        if index > 0
            && self.children[index].size() > 0
            && C::compare(key, &self.keys[index - 1]) == Ordering::Equal
        {
            persist::mark_changed(&self.hook);
            self.keys[index - 1] = self.children[index]
                .min_key()
                .ok_or(TreeError::Corruption("separator source has no least key"))?;
        }

        if removed_first_bucket {
            if index > 0 {
                // The lost bucket sat right after the left sibling subtree's
                // rightmost bucket; splice it out there.
                splice_after_rightmost(&self.children[index - 1]);
                removed_first_bucket = false;
            } else {
                self.firstbucket = self.children[0].firstbucket();
            }
        }

        if self.children[index].size() == 0 {
            if let Child::Leaf(bucket) = &self.children[index] {
                if index > 0 {
                    splice_after_rightmost(&self.children[index - 1]);
                } else {
                    self.firstbucket = bucket.borrow().next.clone();
                    removed_first_bucket = true;
                }
            }
            tracing::trace!(target: "bosque::tree", index, "removing emptied child");
            self.remove_child(index);
            persist::mark_changed(&self.hook);
        }

        Ok((removed_first_bucket, value))
    }

    fn remove_child(&mut self, index: usize) {
        self.children.remove(index);
        if index > 0 {
            self.keys.remove(index - 1);
        } else if !self.keys.is_empty() {
            self.keys.remove(0);
        }
    }

    fn export(&self) -> TreeState<C::Key, D::Value> {
        if self.children.is_empty() {
            return TreeState::Empty;
        }
        if self.children.len() == 1 {
            if let Child::Leaf(bucket) = &self.children[0] {
                let bucket = bucket.borrow();
                if persist::oid_of(&bucket.hook).is_none() {
                    return TreeState::Inline(bucket.export_state());
                }
            }
        }
        let first = export_child(&self.children[0]);
        let rest = self
            .keys
            .iter()
            .zip(self.children[1..].iter())
            .map(|(key, child)| (key.clone(), export_child(child)))
            .collect();
        let firstbucket = self
            .firstbucket
            .as_ref()
            .and_then(Weak::upgrade)
            .and_then(|bucket| persist::oid_of(&bucket.borrow().hook));
        TreeState::Spread {
            first,
            rest,
            firstbucket,
        }
    }
}

fn export_child<C: KeyCodec, D: ValueCodec>(child: &Child<C, D>) -> ChildState<C::Key, D::Value> {
    match child {
        Child::Inner(node) => ChildState::Tree(Box::new(node.borrow().export())),
        Child::Leaf(bucket) => ChildState::Leaf(bucket.borrow().export_state()),
    }
}

/// Move the tail children into a fresh node, dropping the separator between
/// the halves (the caller re-derives it as the new node's least key).
fn split_tree<C: KeyCodec, D: ValueCodec>(this: &TreeRef<C, D>, at: Option<usize>) -> TreeRef<C, D> {
    let mut node = this.borrow_mut();
    let index = at.unwrap_or(node.children.len() / 2);
    let moved_children = node.children.split_off(index);
    let moved_keys = if index > 0 {
        let moved = node.keys.split_off(index);
        node.keys.pop();
        moved
    } else {
        std::mem::take(&mut node.keys)
    };
    let firstbucket = moved_children.first().and_then(Child::firstbucket);
    if node.children.is_empty() {
        node.firstbucket = None;
    }
    Rc::new(RefCell::new(TreeNode {
        keys: moved_keys,
        children: moved_children,
        firstbucket,
        hook: None,
    }))
}

fn find_bucket<C: KeyCodec, D: ValueCodec>(
    root: &TreeRef<C, D>,
    key: &C::Key,
) -> Option<BucketRef<C, D>> {
    let mut node = root.clone();
    loop {
        let next = {
            let n = node.borrow();
            if n.children.is_empty() {
                return None;
            }
            match &n.children[n.child_index(key)] {
                Child::Leaf(bucket) => return Some(bucket.clone()),
                Child::Inner(child) => child.clone(),
            }
        };
        node = next;
    }
}

fn node_max_key<C: KeyCodec, D: ValueCodec>(
    node: &TreeNode<C, D>,
    bound: Option<&C::Key>,
) -> Result<C::Key> {
    if node.children.is_empty() {
        return Err(TreeError::NotFound);
    }
    let index = match bound {
        None => node.children.len() - 1,
        Some(bound) => {
            let mut index = node.child_index(bound);
            // A separator can sit below its child's actual least key, so the
            // bound may select a child whose whole subtree lies above it.
            if index > 0 {
                if let Some(min) = node.children[index].min_key() {
                    if C::compare(&min, bound) == Ordering::Greater {
                        index -= 1;
                    }
                }
            }
            index
        }
    };
    match &node.children[index] {
        Child::Leaf(bucket) => bucket.borrow().max_key(bound),
        Child::Inner(child) => node_max_key(&child.borrow(), bound),
    }
}

fn check_node<C: KeyCodec, D: ValueCodec>(
    node: &TreeRef<C, D>,
    nextbucket: Option<&BucketRef<C, D>>,
) -> Result<()> {
    let n = node.borrow();
    if n.children.is_empty() {
        if n.firstbucket.as_ref().and_then(Weak::upgrade).is_some() {
            return Err(TreeError::Corruption("empty tree has a firstbucket"));
        }
        return Ok(());
    }
    if n.keys.len() + 1 != n.children.len() {
        return Err(TreeError::Corruption(
            "separator count does not match child count",
        ));
    }
    let first = n
        .firstbucket
        .as_ref()
        .and_then(Weak::upgrade)
        .ok_or(TreeError::Corruption("non-empty tree has no firstbucket"))?;
    let leaf_level = n.children[0].is_leaf();
    for child in &n.children {
        if child.is_leaf() != leaf_level {
            return Err(TreeError::Corruption("tree children have different kinds"));
        }
        if child.size() == 0 {
            return Err(TreeError::Corruption("tree holds an empty child"));
        }
    }
    if leaf_level {
        for (i, child) in n.children.iter().enumerate() {
            let Child::Leaf(bucket) = child else {
                return Err(TreeError::Corruption("tree children have different kinds"));
            };
            if i == 0 && !Rc::ptr_eq(&first, bucket) {
                return Err(TreeError::Corruption(
                    "bottom-level firstbucket is not the first child",
                ));
            }
            let expected = match n.children.get(i + 1) {
                Some(Child::Leaf(next)) => Some(next.clone()),
                Some(Child::Inner(_)) => {
                    return Err(TreeError::Corruption("tree children have different kinds"))
                }
                None => nextbucket.cloned(),
            };
            let actual = bucket.borrow().next_ref();
            let linked = match (&actual, &expected) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                _ => false,
            };
            if !linked {
                return Err(TreeError::Corruption("bucket chain is damaged"));
            }
        }
    } else {
        let child_first = n.children[0]
            .firstbucket()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(TreeError::Corruption("subtree has no firstbucket"))?;
        if !Rc::ptr_eq(&first, &child_first) {
            return Err(TreeError::Corruption(
                "firstbucket differs from the first child's",
            ));
        }
        for i in 0..n.children.len() {
            let Child::Inner(child) = &n.children[i] else {
                return Err(TreeError::Corruption("tree children have different kinds"));
            };
            if i + 1 < n.children.len() {
                let boundary = n.children[i + 1]
                    .firstbucket()
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .ok_or(TreeError::Corruption("subtree has no firstbucket"))?;
                check_node(child, Some(&boundary))?;
            } else {
                check_node(child, nextbucket)?;
            }
        }
    }
    Ok(())
}

fn build_child<C: KeyCodec, D: ValueCodec>(
    state: ChildState<C::Key, D::Value>,
    leaves: &mut Vec<BucketRef<C, D>>,
) -> Result<Child<C, D>> {
    match state {
        ChildState::Leaf(leaf) => {
            let mut node = BucketNode::new();
            node.import_entries(leaf);
            let bucket = Rc::new(RefCell::new(node));
            leaves.push(bucket.clone());
            Ok(Child::Leaf(bucket))
        }
        ChildState::Tree(state) => {
            let node = build_tree(*state, leaves)?;
            Ok(Child::Inner(node))
        }
    }
}

fn build_tree<C: KeyCodec, D: ValueCodec>(
    state: TreeState<C::Key, D::Value>,
    leaves: &mut Vec<BucketRef<C, D>>,
) -> Result<TreeRef<C, D>> {
    let mut node = TreeNode::new();
    match state {
        TreeState::Empty => {}
        TreeState::Inline(leaf) => {
            let child = build_child(ChildState::Leaf(leaf), leaves)?;
            node.children.push(child);
        }
        TreeState::Spread {
            first,
            rest,
            firstbucket: _,
        } => {
            let leaf_level = matches!(first, ChildState::Leaf(_));
            for (_, child) in &rest {
                if matches!(child, ChildState::Leaf(_)) != leaf_level {
                    return Err(TreeError::Type("tree children have mixed kinds"));
                }
            }
            node.children.push(build_child(first, leaves)?);
            for (key, child) in rest {
                node.keys.push(key);
                node.children.push(build_child(child, leaves)?);
            }
        }
    }
    Ok(Rc::new(RefCell::new(node)))
}

/// Re-derive every firstbucket cache from the rebuilt structure, returning
/// the subtree's leftmost bucket.
fn rebuild_firstbuckets<C: KeyCodec, D: ValueCodec>(
    node: &TreeRef<C, D>,
) -> Option<WeakBucketRef<C, D>> {
    let mut first = None;
    {
        let n = node.borrow();
        for (i, child) in n.children.iter().enumerate() {
            let firstbucket = match child {
                Child::Leaf(bucket) => Some(Rc::downgrade(bucket)),
                Child::Inner(child) => rebuild_firstbuckets(child),
            };
            if i == 0 {
                first = firstbucket;
            }
        }
    }
    node.borrow_mut().firstbucket = first.clone();
    first
}

fn inline_bucket_state<K, V>(
    state: &TreeState<K, V>,
) -> std::result::Result<Option<&LeafState<K, V>>, ConflictError> {
    match state {
        TreeState::Empty => Ok(None),
        TreeState::Inline(leaf) => Ok(Some(leaf)),
        TreeState::Spread { .. } => {
            Err(ConflictError::new(-1, -1, -1, ConflictReason::NestedTree))
        }
    }
}

/// B-tree mapping.
pub struct Tree<C: KeyCodec, D: ValueCodec> {
    root: TreeRef<C, D>,
    config: TreeConfig,
}

impl<C: KeyCodec, D: ValueCodec> Tree<C, D> {
    /// Empty tree with the family's default capacities.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::for_family::<C, D>())
    }

    /// Empty tree with explicit capacities.
    pub fn with_config(config: TreeConfig) -> Self {
        Tree {
            root: Rc::new(RefCell::new(TreeNode::new())),
            config,
        }
    }

    /// The capacities this tree splits against.
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Store `value` under `key`, returning the previous value if the key
    /// was present.
    pub fn insert(&mut self, key: C::Key, value: D::Value) -> Result<Option<D::Value>> {
        let outcome = self.root.borrow_mut().set_in(key, value, false, &self.config)?;
        Ok(match outcome {
            SetOutcome::Unchanged(previous) | SetOutcome::Replaced(previous) => Some(previous),
            SetOutcome::Grew => None,
        })
    }

    /// Store only when the key is absent; reports whether a store happened.
    pub fn insert_if_absent(&mut self, key: C::Key, value: D::Value) -> Result<bool> {
        let outcome = self.root.borrow_mut().set_in(key, value, true, &self.config)?;
        Ok(matches!(outcome, SetOutcome::Grew))
    }

    /// The resident value, storing `value` first when the key was absent.
    pub fn get_or_insert(&mut self, key: C::Key, value: D::Value) -> Result<D::Value> {
        let outcome = self
            .root
            .borrow_mut()
            .set_in(key, value.clone(), true, &self.config)?;
        Ok(match outcome {
            SetOutcome::Unchanged(existing) => existing,
            _ => value,
        })
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &C::Key) -> Option<D::Value> {
        let bucket = find_bucket(&self.root, key)?;
        let node = bucket.borrow();
        let index = node.search(key);
        if index >= 0 {
            Some(node.values[index as usize].clone())
        } else {
            None
        }
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &C::Key) -> bool {
        match find_bucket(&self.root, key) {
            Some(bucket) => bucket.borrow().contains(key),
            None => false,
        }
    }

    /// Remove `key`, returning its value. Fails with not-found on a miss.
    pub fn remove(&mut self, key: &C::Key) -> Result<D::Value> {
        let (_, value) = self.root.borrow_mut().del_in(key)?;
        Ok(value)
    }

    /// Remove and return the smallest entry, `None` when empty.
    pub fn pop_first(&mut self) -> Result<Option<(C::Key, D::Value)>> {
        match self.min_key(None) {
            Ok(key) => {
                let value = self.remove(&key)?;
                Ok(Some((key, value)))
            }
            Err(TreeError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Store every pair in order.
    pub fn update<I: IntoIterator<Item = (C::Key, D::Value)>>(&mut self, pairs: I) -> Result<()> {
        for (key, value) in pairs {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        let mut root = self.root.borrow_mut();
        if !root.children.is_empty() {
            persist::mark_changed(&root.hook);
            root.keys.clear();
            root.children.clear();
        }
        root.firstbucket = None;
    }

    /// Number of entries, by walking the bucket chain (O(buckets)).
    pub fn len(&self) -> usize {
        let mut total = 0;
        let mut bucket = self.root.borrow().firstbucket.as_ref().and_then(Weak::upgrade);
        while let Some(current) = bucket {
            total += current.borrow().len();
            bucket = current.borrow().next_ref();
        }
        total
    }

    /// Whether the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.root.borrow().children.is_empty()
    }

    /// The root's child count.
    pub fn size(&self) -> usize {
        self.root.borrow().children.len()
    }

    /// Smallest key, or smallest key `>= bound`. The bounded form consults
    /// only the bucket the bound descends to.
    pub fn min_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        let bucket = match bound {
            None => self.root.borrow().firstbucket.as_ref().and_then(Weak::upgrade),
            Some(bound) => find_bucket(&self.root, bound),
        };
        match bucket {
            Some(bucket) => {
                let key = bucket.borrow().min_key(bound);
                key
            }
            None => Err(TreeError::NotFound),
        }
    }

    /// Largest key, or largest key `<= bound`.
    pub fn max_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        node_max_key(&self.root.borrow(), bound)
    }

    /// Entries inside `range`, walking the bucket chain lazily.
    pub fn items(&self, range: &RangeSpec<C::Key>) -> RangeItems<C, D> {
        let root = self.root.borrow();
        if root.children.is_empty() {
            return RangeItems::new(None, range.clone());
        }
        let start = match &range.min {
            Some(min) => find_bucket(&self.root, min),
            None => root.firstbucket.as_ref().and_then(Weak::upgrade),
        };
        RangeItems::new(start, range.clone())
    }

    /// Keys inside `range`.
    pub fn keys(&self, range: &RangeSpec<C::Key>) -> RangeKeys<C, D> {
        RangeKeys::new(self.items(range))
    }

    /// Values inside `range`.
    pub fn values(&self, range: &RangeSpec<C::Key>) -> RangeValues<C, D> {
        RangeValues::new(self.items(range))
    }

    /// All entries in key order.
    pub fn iter(&self) -> RangeItems<C, D> {
        self.items(&RangeSpec::all())
    }

    /// Validate structural invariants: child homogeneity, firstbucket
    /// caches, and chain continuity within and across subtree boundaries.
    pub fn check(&self) -> Result<()> {
        check_node(&self.root, None)
    }

    /// Structural snapshot. A one-bucket tree whose bucket has no persisted
    /// identity inlines the bucket state.
    pub fn export_state(&self) -> TreeState<C::Key, D::Value> {
        self.root.borrow().export()
    }

    /// Rebuild content from a snapshot, re-deriving chain links and
    /// firstbucket caches from leaf order. Shape violations (mixed child
    /// kinds) fail loudly; semantic invariants are [`check`](Self::check)'s
    /// job.
    pub fn import_state(&mut self, state: TreeState<C::Key, D::Value>) -> Result<()> {
        let mut leaves = Vec::new();
        let built = build_tree(state, &mut leaves)?;
        for pair in leaves.windows(2) {
            pair[0].borrow_mut().next = Some(Rc::downgrade(&pair[1]));
        }
        rebuild_firstbuckets(&built);
        let mut root = self.root.borrow_mut();
        let mut built = built.borrow_mut();
        root.keys = std::mem::take(&mut built.keys);
        root.children = std::mem::take(&mut built.children);
        root.firstbucket = built.firstbucket.take();
        Ok(())
    }

    /// Three-way merge of tree states. Only the degenerate single-inline-
    /// bucket form resolves; anything else fails with the nested-tree reason.
    pub fn resolve_conflict(
        old: &TreeState<C::Key, D::Value>,
        committed: &TreeState<C::Key, D::Value>,
        new: &TreeState<C::Key, D::Value>,
    ) -> std::result::Result<TreeState<C::Key, D::Value>, ConflictError> {
        let old = inline_bucket_state(old)?;
        let committed = inline_bucket_state(committed)?;
        let new = inline_bucket_state(new)?;
        let merged = resolve::resolve_leaf::<C, D>(old, committed, new)?;
        Ok(TreeState::Inline(merged))
    }

    /// Attach or clear the root's persistence capability.
    pub fn set_hook(&mut self, hook: HookRef) {
        self.root.borrow_mut().hook = hook;
    }
}

impl<C: KeyCodec, D: ValueCodec> Default for Tree<C, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: KeyCodec, D: ValueCodec> FromIterator<(C::Key, D::Value)> for Tree<C, D> {
    fn from_iter<I: IntoIterator<Item = (C::Key, D::Value)>>(iter: I) -> Self {
        let mut tree = Tree::new();
        for (key, value) in iter {
            // A fresh tree carries no hooks, so insertion cannot fail.
            let _ = tree.insert(key, value);
        }
        tree
    }
}

impl<C: KeyCodec, D: ValueCodec> fmt::Debug for Tree<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// B-tree set: a [`Tree`] over the unit value codec.
pub struct TreeSet<C: KeyCodec> {
    tree: Tree<C, Unit>,
}

impl<C: KeyCodec> TreeSet<C> {
    /// Empty set with the family's default capacities.
    pub fn new() -> Self {
        TreeSet { tree: Tree::new() }
    }

    /// Empty set with explicit capacities.
    pub fn with_config(config: TreeConfig) -> Self {
        TreeSet {
            tree: Tree::with_config(config),
        }
    }

    /// Add `key`; reports whether it was newly added.
    pub fn insert(&mut self, key: C::Key) -> Result<bool> {
        self.tree.insert_if_absent(key, ())
    }

    /// Remove `key`. Fails with not-found on a miss.
    pub fn remove(&mut self, key: &C::Key) -> Result<()> {
        self.tree.remove(key).map(|_| ())
    }

    /// Remove `key` if present; reports whether it was there.
    pub fn discard(&mut self, key: &C::Key) -> Result<bool> {
        match self.tree.remove(key) {
            Ok(()) => Ok(true),
            Err(TreeError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remove and return the smallest key, `None` when empty.
    pub fn pop_first(&mut self) -> Result<Option<C::Key>> {
        Ok(self.tree.pop_first()?.map(|(key, ())| key))
    }

    /// Add every key in order.
    pub fn update<I: IntoIterator<Item = C::Key>>(&mut self, keys: I) -> Result<()> {
        for key in keys {
            self.insert(key)?;
        }
        Ok(())
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &C::Key) -> bool {
        self.tree.contains(key)
    }

    /// Number of keys, by walking the bucket chain.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the set has no keys.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The root's child count.
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    /// Drop all keys.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Smallest key, or smallest key `>= bound`.
    pub fn min_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        self.tree.min_key(bound)
    }

    /// Largest key, or largest key `<= bound`.
    pub fn max_key(&self, bound: Option<&C::Key>) -> Result<C::Key> {
        self.tree.max_key(bound)
    }

    /// Keys inside `range`.
    pub fn keys(&self, range: &RangeSpec<C::Key>) -> RangeKeys<C, Unit> {
        self.tree.keys(range)
    }

    /// All keys in order.
    pub fn iter(&self) -> RangeKeys<C, Unit> {
        self.tree.keys(&RangeSpec::all())
    }

    /// Whether the two sets share no key.
    pub fn is_disjoint(&self, other: &TreeSet<C>) -> bool {
        let mut left = self.iter();
        let mut right = other.iter();
        let (mut a, mut b) = (left.next(), right.next());
        while let (Some(x), Some(y)) = (&a, &b) {
            match C::compare(x, y) {
                Ordering::Less => a = left.next(),
                Ordering::Greater => b = right.next(),
                Ordering::Equal => return false,
            }
        }
        true
    }

    /// Validate structural invariants.
    pub fn check(&self) -> Result<()> {
        self.tree.check()
    }

    /// Structural snapshot.
    pub fn export_state(&self) -> TreeState<C::Key, ()> {
        self.tree.export_state()
    }

    /// Rebuild content from a snapshot.
    pub fn import_state(&mut self, state: TreeState<C::Key, ()>) -> Result<()> {
        self.tree.import_state(state)
    }

    /// Three-way merge of tree-set states.
    pub fn resolve_conflict(
        old: &TreeState<C::Key, ()>,
        committed: &TreeState<C::Key, ()>,
        new: &TreeState<C::Key, ()>,
    ) -> std::result::Result<TreeState<C::Key, ()>, ConflictError> {
        Tree::<C, Unit>::resolve_conflict(old, committed, new)
    }

    /// Attach or clear the root's persistence capability.
    pub fn set_hook(&mut self, hook: HookRef) {
        self.tree.set_hook(hook);
    }
}

impl<C: KeyCodec> Default for TreeSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: KeyCodec> FromIterator<C::Key> for TreeSet<C> {
    fn from_iter<I: IntoIterator<Item = C::Key>>(iter: I) -> Self {
        let mut set = TreeSet::new();
        for key in iter {
            // A fresh set carries no hooks, so insertion cannot fail.
            let _ = set.insert(key);
        }
        set
    }
}

impl<C: KeyCodec> fmt::Debug for TreeSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
