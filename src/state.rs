//! Structural snapshots.
//!
//! These are the values the embedding persistence layer serializes, diffs,
//! and hands to the conflict resolver. They carry content and shape only;
//! chain links and firstbucket caches are re-derived on import. The `serde`
//! derives leave the encoding to the embedder.

use serde::{Deserialize, Serialize};

use crate::persist::Oid;

/// Snapshot of one mapping bucket: ordered entries plus the successor's
/// persisted identity, when the successor has one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafState<K, V> {
    /// Key/value pairs in key order.
    pub entries: Vec<(K, V)>,
    /// Token for the next bucket in the chain.
    pub next: Option<Oid>,
}

/// Snapshot of one set bucket: bare keys plus the successor token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetState<K> {
    /// Keys in order.
    pub keys: Vec<K>,
    /// Token for the next bucket in the chain.
    pub next: Option<Oid>,
}

impl<K> From<SetState<K>> for LeafState<K, ()> {
    fn from(state: SetState<K>) -> Self {
        LeafState {
            entries: state.keys.into_iter().map(|key| (key, ())).collect(),
            next: state.next,
        }
    }
}

impl<K> From<LeafState<K, ()>> for SetState<K> {
    fn from(state: LeafState<K, ()>) -> Self {
        SetState {
            keys: state.entries.into_iter().map(|(key, ())| key).collect(),
            next: state.next,
        }
    }
}

/// Snapshot of one interior child, preserving the node kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ChildState<K, V> {
    /// A nested interior node.
    Tree(Box<TreeState<K, V>>),
    /// A leaf bucket.
    Leaf(LeafState<K, V>),
}

/// Snapshot of a tree node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TreeState<K, V> {
    /// No entries at all.
    Empty,
    /// The degenerate one-bucket tree whose bucket has no persisted identity
    /// of its own; the bucket state is carried inline.
    Inline(LeafState<K, V>),
    /// A real interior node: first child, then separator/child pairs.
    Spread {
        /// Leftmost child.
        first: ChildState<K, V>,
        /// Remaining children, each preceded by its separator key.
        rest: Vec<(K, ChildState<K, V>)>,
        /// Token for the subtree's leftmost bucket.
        firstbucket: Option<Oid>,
    },
}
