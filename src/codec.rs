//! Type-family codecs: the key ordering, value merge behavior, and node
//! capacity defaults that distinguish one container family from another.
//!
//! Concrete families live in [`crate::families`]; the containers are generic
//! over these traits and never compare or merge payloads directly.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, TreeError};

/// Describes the key side of a type family.
pub trait KeyCodec {
    /// Native key representation stored in nodes.
    type Key: Clone + fmt::Debug;

    /// Total order over keys. Containers never call `Ord` on keys directly.
    fn compare(a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Smallest representable key, when the domain is bounded.
    fn lower_bound() -> Option<Self::Key> {
        None
    }

    /// Largest representable key, when the domain is bounded.
    fn upper_bound() -> Option<Self::Key> {
        None
    }

    /// Default bucket capacity for this key family.
    fn default_max_leaf_size() -> usize {
        120
    }

    /// Default interior-node capacity for this key family.
    fn default_max_internal_size() -> usize {
        500
    }
}

/// Describes the value side of a type family.
pub trait ValueCodec {
    /// Native value representation stored in buckets.
    type Value: Clone + fmt::Debug + PartialEq;

    /// Storing an equal value over an existing entry is skipped entirely
    /// (no write, no dirty mark). Byte families set this.
    const SAME_CHECK: bool = false;

    /// Values are heap payloads; default leaf capacity is halved.
    const BOXED: bool = false;

    /// Scale a value by a weight. Identity for non-numeric families.
    fn apply_weight(value: Self::Value, weight: i64) -> Result<Self::Value> {
        let _ = weight;
        Ok(value)
    }

    /// The weight identity contributed by keys coming from a valueless set
    /// operand. `None` means the family does not support weighted merges,
    /// which gates [`merge`](Self::merge) at the call sites.
    fn merge_identity() -> Option<Self::Value> {
        None
    }

    /// Combine two weighted values for one key, `v1*w1 + v2*w2` for numeric
    /// families.
    fn merge(v1: Self::Value, w1: i64, v2: Self::Value, w2: i64) -> Result<Self::Value> {
        let _ = (v1, w1, v2, w2);
        Err(TreeError::Type("invalid set operation"))
    }
}

/// Node capacity knobs for one tree instance.
///
/// Capacities are maxima, not targets: a node splits only after an insert
/// pushes it past the limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Entries a bucket may hold before it splits.
    pub max_leaf_size: usize,
    /// Children an interior node may hold before it splits.
    pub max_internal_size: usize,
}

impl TreeConfig {
    /// Capacities derived from the family defaults, halving leaves for
    /// boxed-value families.
    pub fn for_family<C: KeyCodec, D: ValueCodec>() -> Self {
        let mut max_leaf_size = C::default_max_leaf_size();
        if D::BOXED {
            max_leaf_size = (max_leaf_size / 2).max(1);
        }
        TreeConfig {
            max_leaf_size,
            max_internal_size: C::default_max_internal_size(),
        }
    }
}
