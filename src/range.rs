//! Range filters and the lazy bucket-chain iterators behind tree range
//! queries.
//!
//! A tree locates the starting bucket once; everything after that walks the
//! `next` chain without revisiting interior nodes. Each bucket's index window
//! is computed on entry, so the walk tolerates live mutation of the
//! underlying buckets (a shrunken window is clamped, a dropped successor ends
//! the walk; items already buffered for the current bucket keep flowing).

use crate::bucket::{BucketNode, BucketRef};
use crate::codec::{KeyCodec, ValueCodec};

/// Key-range filter with independent inclusive/exclusive edges.
///
/// An exclusion flag is honored even without its bound: excluding an
/// unbounded minimum drops the very first element of the range, excluding an
/// unbounded maximum drops the last.
#[derive(Clone, Debug)]
pub struct RangeSpec<K> {
    /// Lower bound, inclusive unless excluded.
    pub min: Option<K>,
    /// Upper bound, inclusive unless excluded.
    pub max: Option<K>,
    /// Drop the minimal element of the range.
    pub exclude_min: bool,
    /// Drop the maximal element of the range.
    pub exclude_max: bool,
}

impl<K> RangeSpec<K> {
    /// The unbounded range.
    pub fn all() -> Self {
        RangeSpec {
            min: None,
            max: None,
            exclude_min: false,
            exclude_max: false,
        }
    }

    /// Keys `>= min`.
    pub fn at_least(min: K) -> Self {
        RangeSpec {
            min: Some(min),
            ..Self::all()
        }
    }

    /// Keys `<= max`.
    pub fn at_most(max: K) -> Self {
        RangeSpec {
            max: Some(max),
            ..Self::all()
        }
    }

    /// Keys between `min` and `max`, inclusive.
    pub fn between(min: K, max: K) -> Self {
        RangeSpec {
            min: Some(min),
            max: Some(max),
            exclude_min: false,
            exclude_max: false,
        }
    }

    /// Exclude the minimal element.
    pub fn excluding_min(mut self) -> Self {
        self.exclude_min = true;
        self
    }

    /// Exclude the maximal element.
    pub fn excluding_max(mut self) -> Self {
        self.exclude_max = true;
        self
    }
}

impl<K> Default for RangeSpec<K> {
    fn default() -> Self {
        Self::all()
    }
}

/// One pass over the chain. Buckets are snapshotted window-by-window on
/// entry, never borrowed across yields.
struct ChainWalk<C: KeyCodec, D: ValueCodec> {
    pending: Option<BucketRef<C, D>>,
    spec: RangeSpec<C::Key>,
    buffer: std::vec::IntoIter<(C::Key, D::Value)>,
    // The seeded start bucket may fall entirely outside the range; an empty
    // window on any later bucket ends the walk.
    allow_empty: bool,
}

impl<C: KeyCodec, D: ValueCodec> ChainWalk<C, D> {
    fn new(first: Option<BucketRef<C, D>>, spec: RangeSpec<C::Key>) -> Self {
        ChainWalk {
            pending: first,
            spec,
            buffer: Vec::new().into_iter(),
            allow_empty: true,
        }
    }

    fn snapshot(node: &BucketNode<C, D>, spec: &RangeSpec<C::Key>) -> Vec<(C::Key, D::Value)> {
        let (start, end) = node.range_window(spec);
        node.keys[start..end]
            .iter()
            .cloned()
            .zip(node.values[start..end].iter().cloned())
            .collect()
    }
}

impl<C: KeyCodec, D: ValueCodec> Iterator for ChainWalk<C, D> {
    type Item = (C::Key, D::Value);

    fn next(&mut self) -> Option<(C::Key, D::Value)> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(item);
            }
            let bucket = self.pending.take()?;
            let items = {
                let node = bucket.borrow();
                self.pending = node.next_ref();
                Self::snapshot(&node, &self.spec)
            };
            if items.is_empty() {
                if self.allow_empty {
                    self.allow_empty = false;
                    continue;
                }
                self.pending = None;
                return None;
            }
            self.allow_empty = false;
            self.buffer = items.into_iter();
        }
    }
}

/// Lazy, indexable sequence of `(key, value)` pairs from a bucket chain.
///
/// Iteration and [`get`](Self::get) share the range but not a cursor:
/// `get(i)` replays from the start when `i` precedes the furthest position
/// already reached, mirroring list-style access on a lazy sequence.
pub struct RangeItems<C: KeyCodec, D: ValueCodec> {
    first: Option<BucketRef<C, D>>,
    spec: RangeSpec<C::Key>,
    walk: ChainWalk<C, D>,
    seek: ChainWalk<C, D>,
    seek_index: i64,
    seek_item: Option<(C::Key, D::Value)>,
    known_len: Option<usize>,
}

impl<C: KeyCodec, D: ValueCodec> RangeItems<C, D> {
    pub(crate) fn new(first: Option<BucketRef<C, D>>, spec: RangeSpec<C::Key>) -> Self {
        RangeItems {
            walk: ChainWalk::new(first.clone(), spec.clone()),
            seek: ChainWalk::new(first.clone(), spec.clone()),
            first,
            spec,
            seek_index: -1,
            seek_item: None,
            known_len: None,
        }
    }

    /// The `i`-th pair of the range, `None` when out of range.
    pub fn get(&mut self, i: usize) -> Option<(C::Key, D::Value)> {
        let target = i as i64;
        if target < self.seek_index {
            self.seek = ChainWalk::new(self.first.clone(), self.spec.clone());
            self.seek_index = -1;
            self.seek_item = None;
        }
        while target > self.seek_index {
            match self.seek.next() {
                Some(item) => {
                    self.seek_item = Some(item);
                    self.seek_index += 1;
                }
                None => return None,
            }
        }
        self.seek_item.clone()
    }

    /// Total number of pairs in the range, by one full pass; memoized.
    pub fn len(&mut self) -> usize {
        if let Some(len) = self.known_len {
            return len;
        }
        let len = ChainWalk::new(self.first.clone(), self.spec.clone()).count();
        self.known_len = Some(len);
        len
    }

    /// Whether the range holds no pairs.
    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}

impl<C: KeyCodec, D: ValueCodec> Iterator for RangeItems<C, D> {
    type Item = (C::Key, D::Value);

    fn next(&mut self) -> Option<(C::Key, D::Value)> {
        self.walk.next()
    }
}

/// Key view of [`RangeItems`].
pub struct RangeKeys<C: KeyCodec, D: ValueCodec> {
    items: RangeItems<C, D>,
}

impl<C: KeyCodec, D: ValueCodec> RangeKeys<C, D> {
    pub(crate) fn new(items: RangeItems<C, D>) -> Self {
        RangeKeys { items }
    }

    /// The `i`-th key of the range.
    pub fn get(&mut self, i: usize) -> Option<C::Key> {
        self.items.get(i).map(|(key, _)| key)
    }

    /// Total number of keys in the range; memoized.
    pub fn len(&mut self) -> usize {
        self.items.len()
    }

    /// Whether the range holds no keys.
    pub fn is_empty(&mut self) -> bool {
        self.items.is_empty()
    }
}

impl<C: KeyCodec, D: ValueCodec> Iterator for RangeKeys<C, D> {
    type Item = C::Key;

    fn next(&mut self) -> Option<C::Key> {
        self.items.next().map(|(key, _)| key)
    }
}

/// Value view of [`RangeItems`].
pub struct RangeValues<C: KeyCodec, D: ValueCodec> {
    items: RangeItems<C, D>,
}

impl<C: KeyCodec, D: ValueCodec> RangeValues<C, D> {
    pub(crate) fn new(items: RangeItems<C, D>) -> Self {
        RangeValues { items }
    }

    /// The `i`-th value of the range.
    pub fn get(&mut self, i: usize) -> Option<D::Value> {
        self.items.get(i).map(|(_, value)| value)
    }

    /// Total number of values in the range; memoized.
    pub fn len(&mut self) -> usize {
        self.items.len()
    }

    /// Whether the range holds no values.
    pub fn is_empty(&mut self) -> bool {
        self.items.is_empty()
    }
}

impl<C: KeyCodec, D: ValueCodec> Iterator for RangeValues<C, D> {
    type Item = D::Value;

    fn next(&mut self) -> Option<D::Value> {
        self.items.next().map(|(_, value)| value)
    }
}
