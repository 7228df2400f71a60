//! Set-theoretic operations over any mix of containers in one key family.
//!
//! `union`, `intersection`, and `multiunion` see their operands as ordered
//! key sequences and produce flat [`Set`]s. `difference` keeps the left
//! operand's nature: subtracting from a mapping keeps its values. The
//! weighted variants fold per-operand integer weights into merged values
//! and are only available in families whose value codec declares a merge
//! identity.
//!
//! An absent operand (`None`) is not an empty container: `union` and
//! `intersection` both pass the present side through unchanged, and
//! `difference` passes the left side through. The weighted variants report
//! the pass-through side's weight instead of performing arithmetic on it.

use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, BitXor, Sub};

use crate::bucket::{Bucket, Set};
use crate::codec::{KeyCodec, ValueCodec};
use crate::error::{Result, TreeError};
use crate::tree::{Tree, TreeSet};

/// An operand viewed as an ordered key sequence.
pub trait SetOperand<C: KeyCodec> {
    /// Keys in ascending order.
    fn ordered_keys(&self) -> Box<dyn Iterator<Item = C::Key> + '_>;

    /// Content flattened into a key set.
    fn to_key_set(&self) -> Set<C> {
        Set::from_sorted_keys(self.ordered_keys().collect())
    }
}

/// An operand `difference` can use as its left side. The result keeps this
/// operand's nature: mappings subtract into buckets, sets into sets.
pub trait FlatOperand<C: KeyCodec>: SetOperand<C> {
    /// The flat container kind produced for this operand.
    type Flat;

    /// Content copied into the flat kind.
    fn to_flat(&self) -> Self::Flat;

    /// Entries whose keys are not yielded by `exclude`.
    fn flat_difference(&self, exclude: &mut dyn Iterator<Item = C::Key>) -> Self::Flat;
}

/// An operand usable in weighted operations within the family `(C, D)`.
pub trait WeightedOperand<C: KeyCodec, D: ValueCodec>: SetOperand<C> {
    /// Whether this operand carries real values (mappings do, sets don't).
    fn uses_values(&self) -> bool;

    /// Entries in ascending key order; value-less operands yield `fill`.
    fn weighted_entries<'a>(
        &'a self,
        fill: D::Value,
    ) -> Box<dyn Iterator<Item = (C::Key, D::Value)> + 'a>
    where
        D::Value: 'a;

    /// Content copied into a weighted outcome of the matching nature.
    fn to_outcome(&self) -> WeightedOutcome<C, D>;
}

/// Result container of a weighted operation: a mapping when values were
/// merged, a flat set when every operand was a pure set.
pub enum WeightedOutcome<C: KeyCodec, D: ValueCodec> {
    /// Merged entries with combined values.
    Mapping(Bucket<C, D>),
    /// Combined keys only.
    Set(Set<C>),
}

impl<C: KeyCodec, D: ValueCodec> WeightedOutcome<C, D> {
    /// The mapping variant, if that is what the operation produced.
    pub fn as_mapping(&self) -> Option<&Bucket<C, D>> {
        match self {
            WeightedOutcome::Mapping(bucket) => Some(bucket),
            WeightedOutcome::Set(_) => None,
        }
    }

    /// The set variant, if that is what the operation produced.
    pub fn as_set(&self) -> Option<&Set<C>> {
        match self {
            WeightedOutcome::Mapping(_) => None,
            WeightedOutcome::Set(set) => Some(set),
        }
    }

    /// Number of keys in the outcome.
    pub fn len(&self) -> usize {
        match self {
            WeightedOutcome::Mapping(bucket) => bucket.len(),
            WeightedOutcome::Set(set) => set.len(),
        }
    }

    /// Whether the outcome holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: KeyCodec, D: ValueCodec> std::fmt::Debug for WeightedOutcome<C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightedOutcome::Mapping(bucket) => f.debug_tuple("Mapping").field(bucket).finish(),
            WeightedOutcome::Set(set) => f.debug_tuple("Set").field(set).finish(),
        }
    }
}

impl<C: KeyCodec, D: ValueCodec> SetOperand<C> for Bucket<C, D> {
    fn ordered_keys(&self) -> Box<dyn Iterator<Item = C::Key> + '_> {
        Box::new(self.keys().cloned())
    }
}

impl<C: KeyCodec> SetOperand<C> for Set<C> {
    fn ordered_keys(&self) -> Box<dyn Iterator<Item = C::Key> + '_> {
        Box::new(self.iter().cloned())
    }
}

impl<C: KeyCodec, D: ValueCodec> SetOperand<C> for Tree<C, D> {
    fn ordered_keys(&self) -> Box<dyn Iterator<Item = C::Key> + '_> {
        Box::new(self.keys(&crate::range::RangeSpec::all()))
    }
}

impl<C: KeyCodec> SetOperand<C> for TreeSet<C> {
    fn ordered_keys(&self) -> Box<dyn Iterator<Item = C::Key> + '_> {
        Box::new(self.iter())
    }
}

impl<C: KeyCodec, D: ValueCodec> FlatOperand<C> for Bucket<C, D> {
    type Flat = Bucket<C, D>;

    fn to_flat(&self) -> Bucket<C, D> {
        Bucket::from_sorted_entries(
            self.iter().map(|(key, value)| (key.clone(), value.clone())).collect(),
        )
    }

    fn flat_difference(&self, exclude: &mut dyn Iterator<Item = C::Key>) -> Bucket<C, D> {
        let entries = subtract::<C, _>(
            self.iter().map(|(key, value)| (key.clone(), value.clone())),
            exclude,
            |(key, _)| key,
        );
        Bucket::from_sorted_entries(entries)
    }
}

impl<C: KeyCodec> FlatOperand<C> for Set<C> {
    type Flat = Set<C>;

    fn to_flat(&self) -> Set<C> {
        Set::from_sorted_keys(self.iter().cloned().collect())
    }

    fn flat_difference(&self, exclude: &mut dyn Iterator<Item = C::Key>) -> Set<C> {
        Set::from_sorted_keys(subtract::<C, _>(self.iter().cloned(), exclude, |key| key))
    }
}

impl<C: KeyCodec, D: ValueCodec> FlatOperand<C> for Tree<C, D> {
    type Flat = Bucket<C, D>;

    fn to_flat(&self) -> Bucket<C, D> {
        Bucket::from_sorted_entries(self.iter().collect())
    }

    fn flat_difference(&self, exclude: &mut dyn Iterator<Item = C::Key>) -> Bucket<C, D> {
        Bucket::from_sorted_entries(subtract::<C, _>(self.iter(), exclude, |(key, _)| key))
    }
}

impl<C: KeyCodec> FlatOperand<C> for TreeSet<C> {
    type Flat = Set<C>;

    fn to_flat(&self) -> Set<C> {
        Set::from_sorted_keys(self.iter().collect())
    }

    fn flat_difference(&self, exclude: &mut dyn Iterator<Item = C::Key>) -> Set<C> {
        Set::from_sorted_keys(subtract::<C, _>(self.iter(), exclude, |key| key))
    }
}

impl<C: KeyCodec, D: ValueCodec> WeightedOperand<C, D> for Bucket<C, D> {
    fn uses_values(&self) -> bool {
        true
    }

    fn weighted_entries<'a>(
        &'a self,
        _fill: D::Value,
    ) -> Box<dyn Iterator<Item = (C::Key, D::Value)> + 'a>
    where
        D::Value: 'a,
    {
        Box::new(self.iter().map(|(key, value)| (key.clone(), value.clone())))
    }

    fn to_outcome(&self) -> WeightedOutcome<C, D> {
        WeightedOutcome::Mapping(self.to_flat())
    }
}

impl<C: KeyCodec, D: ValueCodec> WeightedOperand<C, D> for Set<C> {
    fn uses_values(&self) -> bool {
        false
    }

    fn weighted_entries<'a>(
        &'a self,
        fill: D::Value,
    ) -> Box<dyn Iterator<Item = (C::Key, D::Value)> + 'a>
    where
        D::Value: 'a,
    {
        Box::new(self.iter().cloned().map(move |key| (key, fill.clone())))
    }

    fn to_outcome(&self) -> WeightedOutcome<C, D> {
        WeightedOutcome::Set(self.to_flat())
    }
}

impl<C: KeyCodec, D: ValueCodec> WeightedOperand<C, D> for Tree<C, D> {
    fn uses_values(&self) -> bool {
        true
    }

    fn weighted_entries<'a>(
        &'a self,
        _fill: D::Value,
    ) -> Box<dyn Iterator<Item = (C::Key, D::Value)> + 'a>
    where
        D::Value: 'a,
    {
        Box::new(self.iter())
    }

    fn to_outcome(&self) -> WeightedOutcome<C, D> {
        WeightedOutcome::Mapping(FlatOperand::<C>::to_flat(self))
    }
}

impl<C: KeyCodec, D: ValueCodec> WeightedOperand<C, D> for TreeSet<C> {
    fn uses_values(&self) -> bool {
        false
    }

    fn weighted_entries<'a>(
        &'a self,
        fill: D::Value,
    ) -> Box<dyn Iterator<Item = (C::Key, D::Value)> + 'a>
    where
        D::Value: 'a,
    {
        Box::new(self.iter().map(move |key| (key, fill.clone())))
    }

    fn to_outcome(&self) -> WeightedOutcome<C, D> {
        WeightedOutcome::Set(FlatOperand::<C>::to_flat(self))
    }
}

/// Items of `items` whose keys the ordered `exclude` sequence does not
/// contain. Both sides must be ascending.
fn subtract<C: KeyCodec, T>(
    mut items: impl Iterator<Item = T>,
    exclude: &mut dyn Iterator<Item = C::Key>,
    key_of: impl Fn(&T) -> &C::Key,
) -> Vec<T> {
    let mut out = Vec::new();
    let mut item = items.next();
    let mut skip = exclude.next();
    while let Some(current) = item.take() {
        match &skip {
            None => {
                out.push(current);
                item = items.next();
            }
            Some(excluded) => match C::compare(key_of(&current), excluded) {
                Ordering::Less => {
                    out.push(current);
                    item = items.next();
                }
                Ordering::Equal => {
                    item = items.next();
                    skip = exclude.next();
                }
                Ordering::Greater => {
                    item = Some(current);
                    skip = exclude.next();
                }
            },
        }
    }
    out
}

fn key_merge<C: KeyCodec>(
    mut left: Box<dyn Iterator<Item = C::Key> + '_>,
    mut right: Box<dyn Iterator<Item = C::Key> + '_>,
    keep_one_sided: bool,
) -> Vec<C::Key> {
    let mut out = Vec::new();
    let mut a = left.next();
    let mut b = right.next();
    loop {
        match (a.take(), b.take()) {
            (Some(x), Some(y)) => match C::compare(&x, &y) {
                Ordering::Less => {
                    if keep_one_sided {
                        out.push(x);
                    }
                    a = left.next();
                    b = Some(y);
                }
                Ordering::Greater => {
                    if keep_one_sided {
                        out.push(y);
                    }
                    a = Some(x);
                    b = right.next();
                }
                Ordering::Equal => {
                    out.push(x);
                    a = left.next();
                    b = right.next();
                }
            },
            (Some(x), None) => {
                if keep_one_sided {
                    out.push(x);
                }
                a = left.next();
            }
            (None, Some(y)) => {
                if keep_one_sided {
                    out.push(y);
                }
                b = right.next();
            }
            (None, None) => break,
        }
    }
    out
}

/// Keys present in either operand, as a flat set. An absent operand passes
/// the other side's content through; two absent operands yield `None`.
pub fn union<C: KeyCodec>(
    left: Option<&dyn SetOperand<C>>,
    right: Option<&dyn SetOperand<C>>,
) -> Option<Set<C>> {
    match (left, right) {
        (None, None) => None,
        (Some(one), None) | (None, Some(one)) => Some(one.to_key_set()),
        (Some(left), Some(right)) => Some(Set::from_sorted_keys(key_merge::<C>(
            left.ordered_keys(),
            right.ordered_keys(),
            true,
        ))),
    }
}

/// Keys present in both operands, as a flat set. An absent operand passes
/// the other side's content through; two absent operands yield `None`.
pub fn intersection<C: KeyCodec>(
    left: Option<&dyn SetOperand<C>>,
    right: Option<&dyn SetOperand<C>>,
) -> Option<Set<C>> {
    match (left, right) {
        (None, None) => None,
        (Some(one), None) | (None, Some(one)) => Some(one.to_key_set()),
        (Some(left), Some(right)) => Some(Set::from_sorted_keys(key_merge::<C>(
            left.ordered_keys(),
            right.ordered_keys(),
            false,
        ))),
    }
}

/// The left operand's entries whose keys the right operand lacks. The
/// result keeps the left operand's nature. An absent right operand passes
/// the left side through; an absent left operand yields `None`.
pub fn difference<C, A, B>(left: Option<&A>, right: Option<&B>) -> Option<A::Flat>
where
    C: KeyCodec,
    A: FlatOperand<C> + ?Sized,
    B: SetOperand<C> + ?Sized,
{
    let left = left?;
    match right {
        None => Some(left.to_flat()),
        Some(right) => Some(left.flat_difference(&mut right.ordered_keys())),
    }
}

fn weighted_inputs<'a, C: KeyCodec, D: ValueCodec>(
    left: &'a dyn WeightedOperand<C, D>,
    right: &'a dyn WeightedOperand<C, D>,
    w_left: i64,
    w_right: i64,
) -> Result<(
    D::Value,
    bool,
    &'a dyn WeightedOperand<C, D>,
    &'a dyn WeightedOperand<C, D>,
    i64,
    i64,
)> {
    let identity = D::merge_identity().ok_or(TreeError::Type("invalid set operation"))?;
    let merging = left.uses_values() || right.uses_values();
    // Keep the values-bearing side first so merge arguments line up.
    let (first, second, w_first, w_second) = if !left.uses_values() && right.uses_values() {
        (right, left, w_right, w_left)
    } else {
        (left, right, w_left, w_right)
    };
    Ok((identity, merging, first, second, w_first, w_second))
}

/// Weighted union. Keys from either operand survive; a key present on both
/// sides gets `merge(v1, w1, v2, w2)`, a one-sided key gets its value scaled
/// by that side's weight. Pure-set inputs produce a set outcome and no
/// value arithmetic happens. The returned weight applies to the outcome as
/// a whole; pass-through cases reuse the surviving operand's weight.
pub fn weighted_union<C: KeyCodec, D: ValueCodec>(
    left: Option<&dyn WeightedOperand<C, D>>,
    right: Option<&dyn WeightedOperand<C, D>>,
    w_left: i64,
    w_right: i64,
) -> Result<(i64, Option<WeightedOutcome<C, D>>)> {
    let (left, right) = match (left, right) {
        (None, None) => return Ok((0, None)),
        (None, Some(right)) => return Ok((w_right, Some(right.to_outcome()))),
        (Some(left), None) => return Ok((w_left, Some(left.to_outcome()))),
        (Some(left), Some(right)) => (left, right),
    };
    let (identity, merging, first, second, w_first, w_second) =
        weighted_inputs(left, right, w_left, w_right)?;
    if !merging {
        let keys = key_merge::<C>(first.ordered_keys(), second.ordered_keys(), true);
        return Ok((1, Some(WeightedOutcome::Set(Set::from_sorted_keys(keys)))));
    }
    let mut a_iter = first.weighted_entries(identity.clone());
    let mut b_iter = second.weighted_entries(identity);
    let mut entries = Vec::new();
    let mut a = a_iter.next();
    let mut b = b_iter.next();
    loop {
        match (a.take(), b.take()) {
            (Some((ka, va)), Some((kb, vb))) => match C::compare(&ka, &kb) {
                Ordering::Less => {
                    entries.push((ka, D::apply_weight(va, w_first)?));
                    a = a_iter.next();
                    b = Some((kb, vb));
                }
                Ordering::Greater => {
                    entries.push((kb, D::apply_weight(vb, w_second)?));
                    a = Some((ka, va));
                    b = b_iter.next();
                }
                Ordering::Equal => {
                    entries.push((ka, D::merge(va, w_first, vb, w_second)?));
                    a = a_iter.next();
                    b = b_iter.next();
                }
            },
            (Some((ka, va)), None) => {
                entries.push((ka, D::apply_weight(va, w_first)?));
                a = a_iter.next();
            }
            (None, Some((kb, vb))) => {
                entries.push((kb, D::apply_weight(vb, w_second)?));
                b = b_iter.next();
            }
            (None, None) => break,
        }
    }
    Ok((
        1,
        Some(WeightedOutcome::Mapping(Bucket::from_sorted_entries(entries))),
    ))
}

/// Weighted intersection. Only keys present on both sides survive, with
/// `merge(v1, w1, v2, w2)` values. A pure-set outcome's weight is the sum
/// of the operand weights; a mapping outcome's weight is 1.
pub fn weighted_intersection<C: KeyCodec, D: ValueCodec>(
    left: Option<&dyn WeightedOperand<C, D>>,
    right: Option<&dyn WeightedOperand<C, D>>,
    w_left: i64,
    w_right: i64,
) -> Result<(i64, Option<WeightedOutcome<C, D>>)> {
    let (left, right) = match (left, right) {
        (None, None) => return Ok((0, None)),
        (None, Some(right)) => return Ok((w_right, Some(right.to_outcome()))),
        (Some(left), None) => return Ok((w_left, Some(left.to_outcome()))),
        (Some(left), Some(right)) => (left, right),
    };
    let (identity, merging, first, second, w_first, w_second) =
        weighted_inputs(left, right, w_left, w_right)?;
    if !merging {
        let keys = key_merge::<C>(first.ordered_keys(), second.ordered_keys(), false);
        let weight = w_left
            .checked_add(w_right)
            .ok_or(TreeError::Range("weight sum overflows"))?;
        return Ok((
            weight,
            Some(WeightedOutcome::Set(Set::from_sorted_keys(keys))),
        ));
    }
    let mut a_iter = first.weighted_entries(identity.clone());
    let mut b_iter = second.weighted_entries(identity);
    let mut entries = Vec::new();
    let mut a = a_iter.next();
    let mut b = b_iter.next();
    while let (Some((ka, va)), Some((kb, vb))) = (a.take(), b.take()) {
        match C::compare(&ka, &kb) {
            Ordering::Less => {
                a = a_iter.next();
                b = Some((kb, vb));
            }
            Ordering::Greater => {
                a = Some((ka, va));
                b = b_iter.next();
            }
            Ordering::Equal => {
                entries.push((ka, D::merge(va, w_first, vb, w_second)?));
                a = a_iter.next();
                b = b_iter.next();
            }
        }
    }
    Ok((
        1,
        Some(WeightedOutcome::Mapping(Bucket::from_sorted_entries(entries))),
    ))
}

/// Union of any number of operands, as a flat set.
pub fn multiunion<C: KeyCodec>(operands: &[&dyn SetOperand<C>]) -> Set<C> {
    let mut result = Set::new();
    for operand in operands {
        result.update(operand.ordered_keys());
    }
    result
}

impl<C: KeyCodec> BitOr for &Set<C> {
    type Output = Set<C>;

    fn bitor(self, rhs: &Set<C>) -> Set<C> {
        union::<C>(Some(self), Some(rhs)).unwrap_or_default()
    }
}

impl<C: KeyCodec> BitAnd for &Set<C> {
    type Output = Set<C>;

    fn bitand(self, rhs: &Set<C>) -> Set<C> {
        intersection::<C>(Some(self), Some(rhs)).unwrap_or_default()
    }
}

impl<C: KeyCodec> Sub for &Set<C> {
    type Output = Set<C>;

    fn sub(self, rhs: &Set<C>) -> Set<C> {
        difference::<C, _, _>(Some(self), Some(rhs)).unwrap_or_default()
    }
}

impl<C: KeyCodec> BitXor for &Set<C> {
    type Output = Set<C>;

    fn bitxor(self, rhs: &Set<C>) -> Set<C> {
        &(self - rhs) | &(rhs - self)
    }
}

impl<C: KeyCodec> BitOr for &TreeSet<C> {
    type Output = Set<C>;

    fn bitor(self, rhs: &TreeSet<C>) -> Set<C> {
        union::<C>(Some(self), Some(rhs)).unwrap_or_default()
    }
}

impl<C: KeyCodec> BitAnd for &TreeSet<C> {
    type Output = Set<C>;

    fn bitand(self, rhs: &TreeSet<C>) -> Set<C> {
        intersection::<C>(Some(self), Some(rhs)).unwrap_or_default()
    }
}

impl<C: KeyCodec> Sub for &TreeSet<C> {
    type Output = Set<C>;

    fn sub(self, rhs: &TreeSet<C>) -> Set<C> {
        difference::<C, _, _>(Some(self), Some(rhs)).unwrap_or_default()
    }
}

impl<C: KeyCodec> BitXor for &TreeSet<C> {
    type Output = Set<C>;

    fn bitxor(self, rhs: &TreeSet<C>) -> Set<C> {
        &(self - rhs) | &(rhs - self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{Obj, I32};

    fn set(keys: &[i32]) -> Set<I32> {
        keys.iter().copied().collect()
    }

    fn bucket(entries: &[(i32, i32)]) -> Bucket<I32, I32> {
        entries.iter().copied().collect()
    }

    fn tree_set(keys: &[i32]) -> TreeSet<I32> {
        keys.iter().copied().collect()
    }

    #[test]
    fn union_and_intersection_mix_container_kinds() {
        let bucket = bucket(&[(1, 10), (3, 30), (5, 50)]);
        let tree: Tree<I32, I32> = [(2, 20), (3, 31), (8, 80)].into_iter().collect();
        let merged = union::<I32>(Some(&bucket), Some(&tree)).unwrap();
        assert_eq!(merged.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 5, 8]);
        let common = intersection::<I32>(Some(&bucket), Some(&tree)).unwrap();
        assert_eq!(common.iter().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn absent_operands_pass_the_other_side_through() {
        let keys = set(&[4, 9]);
        assert!(union::<I32>(None, None).is_none());
        assert_eq!(
            union::<I32>(Some(&keys), None).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![4, 9]
        );
        assert_eq!(
            intersection::<I32>(None, Some(&keys))
                .unwrap()
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            vec![4, 9]
        );
        assert!(difference::<I32, Set<I32>, Set<I32>>(None, Some(&keys)).is_none());
        let kept = difference::<I32, _, Set<I32>>(Some(&keys), None).unwrap();
        assert_eq!(kept.iter().copied().collect::<Vec<_>>(), vec![4, 9]);
    }

    #[test]
    fn difference_keeps_the_left_operands_values() {
        let mapping = bucket(&[(1, 10), (2, 20), (3, 30)]);
        let drop = set(&[2]);
        let kept = difference::<I32, _, _>(Some(&mapping), Some(&drop)).unwrap();
        assert_eq!(
            kept.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(1, 10), (3, 30)]
        );

        let keys = tree_set(&[1, 2, 3]);
        let kept = difference::<I32, _, _>(Some(&keys), Some(&drop)).unwrap();
        assert_eq!(kept.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn weighted_union_merges_common_keys() {
        let left = bucket(&[(1, 10), (2, 20)]);
        let right = bucket(&[(2, 5), (3, 7)]);
        let (weight, outcome) =
            weighted_union::<I32, I32>(Some(&left), Some(&right), 2, 3).unwrap();
        assert_eq!(weight, 1);
        let merged = outcome.unwrap();
        let mapping = merged.as_mapping().unwrap();
        assert_eq!(
            mapping.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(1, 20), (2, 55), (3, 21)]
        );
    }

    #[test]
    fn weighted_union_fills_set_sides_with_the_identity() {
        let mapping = bucket(&[(1, 10), (2, 20)]);
        let keys = set(&[2, 3]);
        let (weight, outcome) =
            weighted_union::<I32, I32>(Some(&mapping), Some(&keys), 1, 4).unwrap();
        assert_eq!(weight, 1);
        let merged = outcome.unwrap();
        let result = merged.as_mapping().unwrap();
        // The set side contributes the identity value 1, scaled by its weight.
        assert_eq!(
            result.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(1, 10), (2, 24), (3, 4)]
        );

        // Operand order does not change the outcome nature.
        let (_, outcome) = weighted_union::<I32, I32>(Some(&keys), Some(&mapping), 4, 1).unwrap();
        assert!(outcome.unwrap().as_mapping().is_some());
    }

    #[test]
    fn pure_set_weighted_operations_skip_arithmetic() {
        let a = set(&[1, 2]);
        let b = tree_set(&[2, 3]);
        let (weight, outcome) = weighted_union::<I32, I32>(Some(&a), Some(&b), 7, 9).unwrap();
        assert_eq!(weight, 1);
        assert_eq!(
            outcome.unwrap().as_set().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let (weight, outcome) =
            weighted_intersection::<I32, I32>(Some(&a), Some(&b), 7, 9).unwrap();
        assert_eq!(weight, 16);
        assert_eq!(
            outcome.unwrap().as_set().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![2]
        );
    }

    #[test]
    fn weighted_operations_need_a_merge_identity() {
        let left: Set<Obj<String>> = ["a".to_string()].into_iter().collect();
        let right: Set<Obj<String>> = ["b".to_string()].into_iter().collect();
        let err = weighted_union::<Obj<String>, Obj<String>>(Some(&left), Some(&right), 1, 1)
            .unwrap_err();
        assert!(matches!(err, TreeError::Type(_)));

        // Pass-through cases skip the family gate entirely.
        let (weight, outcome) =
            weighted_union::<Obj<String>, Obj<String>>(Some(&left), None, 6, 1).unwrap();
        assert_eq!(weight, 6);
        assert_eq!(outcome.unwrap().len(), 1);
    }

    #[test]
    fn weighted_arithmetic_overflow_is_a_range_error() {
        let left = bucket(&[(1, i32::MAX)]);
        let right = bucket(&[(1, 1)]);
        let err = weighted_union::<I32, I32>(Some(&left), Some(&right), 2, 1).unwrap_err();
        assert!(matches!(err, TreeError::Range(_)));
    }

    #[test]
    fn multiunion_folds_everything() {
        let a = set(&[5, 1]);
        let b = tree_set(&[2, 5]);
        let single = Set::singleton(9);
        let folded = multiunion::<I32>(&[&a, &b, &single]);
        assert_eq!(folded.iter().copied().collect::<Vec<_>>(), vec![1, 2, 5, 9]);
        assert!(multiunion::<I32>(&[]).is_empty());

        let pairwise = union::<I32>(Some(&a), Some(&b)).unwrap();
        let folded_two = multiunion::<I32>(&[&a, &b]);
        assert_eq!(
            pairwise.iter().collect::<Vec<_>>(),
            folded_two.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn operator_sugar_matches_the_functions() {
        let a = set(&[1, 2, 3]);
        let b = set(&[2, 3, 4]);
        assert_eq!((&a | &b).iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!((&a & &b).iter().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!((&a - &b).iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!((&a ^ &b).iter().copied().collect::<Vec<_>>(), vec![1, 4]);

        let ta = tree_set(&[1, 2]);
        let tb = tree_set(&[2, 9]);
        assert_eq!((&ta | &tb).iter().copied().collect::<Vec<_>>(), vec![1, 2, 9]);
        assert_eq!((&ta ^ &tb).iter().copied().collect::<Vec<_>>(), vec![1, 9]);
    }
}
