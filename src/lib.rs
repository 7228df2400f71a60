//! Sorted persistent-friendly B-tree containers.
//!
//! Four container shapes cover the mapping/set and scalable/flat axes:
//! [`Tree`] and [`TreeSet`] are multi-level B-trees whose leaves form a
//! linked bucket chain, [`Bucket`] and [`Set`] are the flat sorted leaves
//! themselves, usable standalone for small collections. All four are
//! parameterized by codec families ([`families`]) that fix key ordering,
//! value merge behavior, and default node capacities.
//!
//! The containers are storage-agnostic but persistence-aware: each node can
//! carry a [`PersistenceHook`] through which it reports dirtiness, asserts
//! read currency before mutating, and exposes a stable object id. State
//! moves through plain serializable snapshots ([`state`]), and concurrent
//! edits of the same leaf merge through three-way conflict resolution with
//! stable rejection reasons ([`ConflictError`]).
//!
//! [`setops`] provides union, intersection, difference, and their weighted
//! variants across any mix of container shapes in one key family, plus
//! operator sugar on the set types.
//!
//! ```
//! use bosque::families::IIBTree;
//! use bosque::RangeSpec;
//!
//! let mut index = IIBTree::new();
//! index.update((0..5).map(|k| (k, k * k)))?;
//! assert_eq!(index.get(&3), Some(9));
//! let window: Vec<i32> = index.keys(&RangeSpec::between(1, 3)).collect();
//! assert_eq!(window, vec![1, 2, 3]);
//! # Ok::<(), bosque::TreeError>(())
//! ```

pub mod bucket;
pub mod codec;
pub mod error;
pub mod families;
pub mod length;
pub mod persist;
pub mod range;
mod resolve;
pub mod setops;
pub mod state;
pub mod tree;

pub use bucket::{Bucket, Set};
pub use codec::{KeyCodec, TreeConfig, ValueCodec};
pub use error::{ConflictError, ConflictReason, Result, TreeError};
pub use length::Length;
pub use persist::{HookRef, Oid, PersistenceHook};
pub use range::RangeSpec;
pub use setops::{
    difference, intersection, multiunion, union, weighted_intersection, weighted_union,
    WeightedOutcome,
};
pub use state::{ChildState, LeafState, SetState, TreeState};
pub use tree::{Tree, TreeSet};
