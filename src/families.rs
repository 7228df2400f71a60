//! Concrete type families and the alias layer naming the common
//! container/family combinations.
//!
//! A family is a zero-sized tag implementing [`KeyCodec`] and/or
//! [`ValueCodec`]. Integer families check wide input against their domain
//! before it ever reaches a node; object families accept any ordered payload
//! and trade node capacity for it.

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::bucket::{Bucket, Set};
use crate::codec::{KeyCodec, ValueCodec};
use crate::error::{Result, TreeError};
use crate::tree::{Tree, TreeSet};

macro_rules! int_family {
    ($(#[$doc:meta])* $name:ident, $native:ty, $coerce_msg:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl $name {
            /// Validate a wide integer into the family's native type.
            pub fn coerce(raw: i128) -> Result<$native> {
                <$native>::try_from(raw).map_err(|_| TreeError::Range($coerce_msg))
            }
        }

        impl KeyCodec for $name {
            type Key = $native;

            fn compare(a: &$native, b: &$native) -> Ordering {
                a.cmp(b)
            }

            fn lower_bound() -> Option<$native> {
                Some(<$native>::MIN)
            }

            fn upper_bound() -> Option<$native> {
                Some(<$native>::MAX)
            }
        }

        impl ValueCodec for $name {
            type Value = $native;

            fn apply_weight(value: $native, weight: i64) -> Result<$native> {
                let scaled = (value as i128)
                    .checked_mul(weight as i128)
                    .ok_or(TreeError::Range($coerce_msg))?;
                <$native>::try_from(scaled).map_err(|_| TreeError::Range($coerce_msg))
            }

            fn merge_identity() -> Option<$native> {
                Some(1)
            }

            fn merge(v1: $native, w1: i64, v2: $native, w2: i64) -> Result<$native> {
                let merged = (v1 as i128)
                    .checked_mul(w1 as i128)
                    .and_then(|a| {
                        (v2 as i128)
                            .checked_mul(w2 as i128)
                            .and_then(|b| a.checked_add(b))
                    })
                    .ok_or(TreeError::Range($coerce_msg))?;
                <$native>::try_from(merged).map_err(|_| TreeError::Range($coerce_msg))
            }
        }
    };
}

int_family!(
    /// 32-bit signed integer family (the `I` code).
    I32,
    i32,
    "outside the 32-bit signed domain"
);
int_family!(
    /// 32-bit unsigned integer family (the `U` code).
    U32,
    u32,
    "outside the 32-bit unsigned domain"
);
int_family!(
    /// 64-bit signed integer family (the `L` code).
    I64,
    i64,
    "outside the 64-bit signed domain"
);
int_family!(
    /// 64-bit unsigned integer family (the `Q` code).
    U64,
    u64,
    "outside the 64-bit unsigned domain"
);

/// 32-bit float family (the `F` code). Keys order by `total_cmp`, so NaN
/// payloads are admitted and sort above infinity.
#[derive(Clone, Copy, Debug, Default)]
pub struct F32;

impl KeyCodec for F32 {
    type Key = f32;

    fn compare(a: &f32, b: &f32) -> Ordering {
        a.total_cmp(b)
    }
}

impl ValueCodec for F32 {
    type Value = f32;

    fn apply_weight(value: f32, weight: i64) -> Result<f32> {
        Ok(value * weight as f32)
    }

    fn merge_identity() -> Option<f32> {
        Some(1.0)
    }

    fn merge(v1: f32, w1: i64, v2: f32, w2: i64) -> Result<f32> {
        Ok(v1 * w1 as f32 + v2 * w2 as f32)
    }
}

/// Fixed-length byte-string family (the `fs` code generalized to any width).
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedBytes<const N: usize>;

impl<const N: usize> FixedBytes<N> {
    /// Validate a byte slice into the family's fixed-width array.
    pub fn coerce(raw: &[u8]) -> Result<[u8; N]> {
        <[u8; N]>::try_from(raw).map_err(|_| TreeError::Type("byte string of the wrong length"))
    }
}

impl<const N: usize> KeyCodec for FixedBytes<N> {
    type Key = [u8; N];

    fn compare(a: &[u8; N], b: &[u8; N]) -> Ordering {
        a.cmp(b)
    }

    fn lower_bound() -> Option<[u8; N]> {
        Some([0x00; N])
    }

    fn upper_bound() -> Option<[u8; N]> {
        Some([0xFF; N])
    }
}

impl<const N: usize> ValueCodec for FixedBytes<N> {
    type Value = [u8; N];

    const SAME_CHECK: bool = true;
}

/// Arbitrary ordered-payload family (the `O` code). Node capacities shrink
/// because payloads are assumed heap-sized.
///
/// Instantiating with `Option<T>` gives a family whose null key sorts
/// strictly below every real key.
pub struct Obj<T>(PhantomData<T>);

impl<T: Ord + Clone + std::fmt::Debug> KeyCodec for Obj<T> {
    type Key = T;

    fn compare(a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }

    fn default_max_leaf_size() -> usize {
        60
    }

    fn default_max_internal_size() -> usize {
        250
    }
}

impl<T: Clone + std::fmt::Debug + PartialEq> ValueCodec for Obj<T> {
    type Value = T;

    const BOXED: bool = true;
}

/// The no-value codec backing set containers. Same-value stores are always
/// skipped, so re-adding a present key never dirties a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unit;

impl ValueCodec for Unit {
    type Value = ();

    const SAME_CHECK: bool = true;
}

/// Int-keyed, int-valued tree (the `II` module).
pub type IIBTree = Tree<I32, I32>;
/// Int-keyed, float-valued tree (the `IF` module).
pub type IFBTree = Tree<I32, F32>;
/// Int-keyed, object-valued tree (the `IO` module).
pub type IOBTree<V> = Tree<I32, Obj<V>>;
/// Object-keyed, int-valued tree (the `OI` module).
pub type OIBTree<K> = Tree<Obj<K>, I32>;
/// Object-keyed, object-valued tree (the `OO` module).
pub type OOBTree<K, V> = Tree<Obj<K>, Obj<V>>;
/// 64-bit signed tree (the `LL` module).
pub type LLBTree = Tree<I64, I64>;
/// 64-bit-keyed, object-valued tree (the `LO` module).
pub type LOBTree<V> = Tree<I64, Obj<V>>;
/// 32-bit unsigned tree (the `UU` module).
pub type UUBTree = Tree<U32, U32>;
/// 64-bit unsigned tree (the `QQ` module).
pub type QQBTree = Tree<U64, U64>;
/// Two-byte-keyed, six-byte-valued tree (the `fs` module).
pub type FsBTree = Tree<FixedBytes<2>, FixedBytes<6>>;

/// Flat int-keyed, int-valued bucket.
pub type IIBucket = Bucket<I32, I32>;
/// Flat int-keyed, float-valued bucket.
pub type IFBucket = Bucket<I32, F32>;
/// Flat object-keyed bucket.
pub type OOBucket<K, V> = Bucket<Obj<K>, Obj<V>>;

/// Flat int set.
pub type IISet = Set<I32>;
/// Flat 64-bit int set.
pub type LLSet = Set<I64>;
/// Flat object set.
pub type OOSet<K> = Set<Obj<K>>;

/// Int tree set.
pub type IITreeSet = TreeSet<I32>;
/// 64-bit int tree set.
pub type LLTreeSet = TreeSet<I64>;
/// Object tree set.
pub type OOTreeSet<K> = TreeSet<Obj<K>>;
