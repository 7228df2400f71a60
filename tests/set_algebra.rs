//! Set algebra across every container kind in one key family, checked
//! against slow-but-obvious reference folds.

use std::collections::{BTreeMap, BTreeSet};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use bosque::families::I32;
use bosque::setops::{
    difference, intersection, multiunion, union, weighted_intersection, weighted_union,
    SetOperand, WeightedOperand, WeightedOutcome,
};
use bosque::{Bucket, Set, Tree, TreeSet};

const A_KEYS: [i32; 4] = [1, 3, 5, 6];
const B_KEYS: [i32; 5] = [2, 3, 4, 6, 7];
const A_ITEMS: [(i32, i32); 4] = [(1, 10), (3, 30), (5, 50), (6, 60)];
const B_ITEMS: [(i32, i32); 5] = [(2, 21), (3, 31), (4, 41), (6, 61), (7, 71)];

/// Every container kind holding the given keys, viewed as plain operands.
fn key_zoo(keys: &[i32]) -> Vec<Box<dyn SetOperand<I32>>> {
    let bucket: Bucket<I32, I32> = keys.iter().map(|&k| (k, k)).collect();
    let tree: Tree<I32, I32> = keys.iter().map(|&k| (k, k)).collect();
    let set: Set<I32> = keys.iter().copied().collect();
    let tree_set: TreeSet<I32> = keys.iter().copied().collect();
    vec![
        Box::new(bucket),
        Box::new(tree),
        Box::new(set),
        Box::new(tree_set),
    ]
}

/// Mapping and set kinds over the given items; the flag records whether the
/// operand carries values.
fn weighted_zoo(items: &[(i32, i32)]) -> Vec<(bool, Box<dyn WeightedOperand<I32, I32>>)> {
    let bucket: Bucket<I32, I32> = items.iter().copied().collect();
    let tree: Tree<I32, I32> = items.iter().copied().collect();
    let set: Set<I32> = items.iter().map(|(k, _)| *k).collect();
    let tree_set: TreeSet<I32> = items.iter().map(|(k, _)| *k).collect();
    vec![
        (true, Box::new(bucket)),
        (true, Box::new(tree)),
        (false, Box::new(set)),
        (false, Box::new(tree_set)),
    ]
}

fn keys_of(set: &Set<I32>) -> Vec<i32> {
    set.iter().copied().collect()
}

fn naive_union(a: &[i32], b: &[i32]) -> Vec<i32> {
    let mut keys: BTreeSet<i32> = a.iter().copied().collect();
    keys.extend(b.iter().copied());
    keys.into_iter().collect()
}

fn naive_intersection(a: &[i32], b: &[i32]) -> Vec<i32> {
    let b: BTreeSet<i32> = b.iter().copied().collect();
    let a: BTreeSet<i32> = a.iter().copied().collect();
    a.intersection(&b).copied().collect()
}

fn naive_difference(a: &[i32], b: &[i32]) -> Vec<i32> {
    let b: BTreeSet<i32> = b.iter().copied().collect();
    let a: BTreeSet<i32> = a.iter().copied().collect();
    a.difference(&b).copied().collect()
}

#[test]
fn union_and_intersection_flatten_every_kind_pair() {
    let a_zoo = key_zoo(&A_KEYS);
    let b_zoo = key_zoo(&B_KEYS);
    for a in &a_zoo {
        for b in &b_zoo {
            let merged = union::<I32>(Some(a.as_ref()), Some(b.as_ref())).unwrap();
            assert_eq!(keys_of(&merged), vec![1, 2, 3, 4, 5, 6, 7]);
            let common = intersection::<I32>(Some(a.as_ref()), Some(b.as_ref())).unwrap();
            assert_eq!(keys_of(&common), vec![3, 6]);
        }
    }
}

#[test]
fn absent_operands_pass_through_or_vanish() {
    assert!(union::<I32>(None, None).is_none());
    assert!(intersection::<I32>(None, None).is_none());
    assert!(difference::<I32, Set<I32>, Set<I32>>(None, None).is_none());

    for a in &key_zoo(&A_KEYS) {
        let merged = union::<I32>(Some(a.as_ref()), None).unwrap();
        assert_eq!(keys_of(&merged), A_KEYS.to_vec());
        let merged = intersection::<I32>(None, Some(a.as_ref())).unwrap();
        assert_eq!(keys_of(&merged), A_KEYS.to_vec());
    }

    let a: Set<I32> = A_KEYS.into_iter().collect();
    assert!(difference::<I32, Set<I32>, Set<I32>>(None, Some(&a)).is_none());
    let kept = difference::<I32, _, Set<I32>>(Some(&a), None).unwrap();
    assert_eq!(keys_of(&kept), A_KEYS.to_vec());
}

#[test]
fn empty_operands_are_not_absent_operands() {
    let a: Set<I32> = A_KEYS.into_iter().collect();
    let empty: Set<I32> = Set::new();

    let merged = union::<I32>(Some(&a), Some(&empty)).unwrap();
    assert_eq!(keys_of(&merged), A_KEYS.to_vec());
    let common = intersection::<I32>(Some(&a), Some(&empty)).unwrap();
    assert!(common.is_empty());
    let kept = difference::<I32, _, _>(Some(&a), Some(&empty)).unwrap();
    assert_eq!(keys_of(&kept), A_KEYS.to_vec());
    let kept = difference::<I32, _, _>(Some(&empty), Some(&a)).unwrap();
    assert!(kept.is_empty());
}

#[test]
fn difference_keeps_the_left_kind_and_its_values() {
    let bucket: Bucket<I32, I32> = A_ITEMS.into_iter().collect();
    let tree: Tree<I32, I32> = A_ITEMS.into_iter().collect();
    let set: Set<I32> = A_KEYS.into_iter().collect();
    let tree_set: TreeSet<I32> = A_KEYS.into_iter().collect();
    let rights = key_zoo(&B_KEYS);

    for right in &rights {
        // Mapping-left results are buckets that keep the left values.
        let kept: Bucket<I32, I32> =
            difference::<I32, _, _>(Some(&bucket), Some(right.as_ref())).unwrap();
        assert_eq!(
            kept.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(1, 10), (5, 50)]
        );
        let kept: Bucket<I32, I32> =
            difference::<I32, _, _>(Some(&tree), Some(right.as_ref())).unwrap();
        assert_eq!(
            kept.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(1, 10), (5, 50)]
        );

        // Set-left results are flat sets.
        let kept: Set<I32> = difference::<I32, _, _>(Some(&set), Some(right.as_ref())).unwrap();
        assert_eq!(keys_of(&kept), vec![1, 5]);
        let kept: Set<I32> =
            difference::<I32, _, _>(Some(&tree_set), Some(right.as_ref())).unwrap();
        assert_eq!(keys_of(&kept), vec![1, 5]);
    }
}

#[test]
fn randomized_operations_match_naive_folds() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5E7);
    for _ in 0..3 {
        let a_keys: Vec<i32> = (0..rng.gen_range(0..200)).map(|_| rng.gen_range(1..400)).collect();
        let b_keys: Vec<i32> = (0..rng.gen_range(0..200)).map(|_| rng.gen_range(1..400)).collect();
        let a_zoo = key_zoo(&a_keys);
        let b_zoo = key_zoo(&b_keys);
        for a in &a_zoo {
            for b in &b_zoo {
                let merged = union::<I32>(Some(a.as_ref()), Some(b.as_ref())).unwrap();
                assert_eq!(keys_of(&merged), naive_union(&a_keys, &b_keys));
                let common = intersection::<I32>(Some(a.as_ref()), Some(b.as_ref())).unwrap();
                assert_eq!(keys_of(&common), naive_intersection(&a_keys, &b_keys));
            }
        }
        let left: Set<I32> = a_keys.iter().copied().collect();
        for b in &b_zoo {
            let kept = difference::<I32, _, _>(Some(&left), Some(b.as_ref())).unwrap();
            assert_eq!(keys_of(&kept), naive_difference(&a_keys, &b_keys));
        }
    }
}

enum Expected {
    Keys(Vec<i32>),
    Items(Vec<(i32, i32)>),
}

/// Reference weighted union: sets read as all-ones mappings, a key missing
/// from one side contributes nothing from it.
fn model_weighted(
    a: &[(i32, i32)],
    a_is_map: bool,
    b: &[(i32, i32)],
    b_is_map: bool,
    w_a: i64,
    w_b: i64,
    keep_one_sided: bool,
) -> (i64, Expected) {
    let a_map: BTreeMap<i32, i64> = a
        .iter()
        .map(|&(k, v)| (k, if a_is_map { i64::from(v) } else { 1 }))
        .collect();
    let b_map: BTreeMap<i32, i64> = b
        .iter()
        .map(|&(k, v)| (k, if b_is_map { i64::from(v) } else { 1 }))
        .collect();
    if !a_is_map && !b_is_map {
        let a_keys: Vec<i32> = a_map.keys().copied().collect();
        let b_keys: Vec<i32> = b_map.keys().copied().collect();
        return if keep_one_sided {
            (1, Expected::Keys(naive_union(&a_keys, &b_keys)))
        } else {
            (w_a + w_b, Expected::Keys(naive_intersection(&a_keys, &b_keys)))
        };
    }
    let mut items = Vec::new();
    let all_keys: BTreeSet<i32> = a_map.keys().chain(b_map.keys()).copied().collect();
    for key in all_keys {
        match (a_map.get(&key), b_map.get(&key)) {
            (Some(&va), Some(&vb)) => items.push((key, (va * w_a + vb * w_b) as i32)),
            (Some(&va), None) if keep_one_sided => items.push((key, (va * w_a) as i32)),
            (None, Some(&vb)) if keep_one_sided => items.push((key, (vb * w_b) as i32)),
            _ => {}
        }
    }
    (1, Expected::Items(items))
}

fn assert_outcome(outcome: &WeightedOutcome<I32, I32>, expected: &Expected) {
    match expected {
        Expected::Keys(keys) => {
            let set = outcome.as_set().expect("expected a set outcome");
            assert_eq!(&keys_of(set), keys);
        }
        Expected::Items(items) => {
            let mapping = outcome.as_mapping().expect("expected a mapping outcome");
            assert_eq!(
                &mapping.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
                items
            );
        }
    }
}

#[test]
fn weighted_union_matches_the_model_across_kinds_and_weights() {
    let mut inputs = weighted_zoo(&A_ITEMS);
    inputs.extend(weighted_zoo(&B_ITEMS));
    inputs.extend(weighted_zoo(&[]));
    let shapes: Vec<(bool, Vec<(i32, i32)>)> = {
        let mut shapes = Vec::new();
        for items in [&A_ITEMS[..], &B_ITEMS[..], &[][..]] {
            for is_map in [true, true, false, false] {
                shapes.push((is_map, items.to_vec()));
            }
        }
        shapes
    };

    for w_a in [-3i64, -1, 0, 1, 7] {
        for w_b in [-3i64, -1, 0, 1, 7] {
            for (ia, (a_is_map, a)) in inputs.iter().enumerate() {
                for (ib, (b_is_map, b)) in inputs.iter().enumerate() {
                    let (weight, outcome) =
                        weighted_union::<I32, I32>(Some(a.as_ref()), Some(b.as_ref()), w_a, w_b)
                            .unwrap();
                    let (want_weight, want) = model_weighted(
                        &shapes[ia].1,
                        *a_is_map,
                        &shapes[ib].1,
                        *b_is_map,
                        w_a,
                        w_b,
                        true,
                    );
                    assert_eq!(weight, want_weight);
                    assert_outcome(&outcome.unwrap(), &want);
                }
            }
        }
    }
}

#[test]
fn weighted_intersection_matches_the_model_across_kinds_and_weights() {
    let mut inputs = weighted_zoo(&A_ITEMS);
    inputs.extend(weighted_zoo(&B_ITEMS));
    let shapes: Vec<(bool, Vec<(i32, i32)>)> = {
        let mut shapes = Vec::new();
        for items in [&A_ITEMS[..], &B_ITEMS[..]] {
            for is_map in [true, true, false, false] {
                shapes.push((is_map, items.to_vec()));
            }
        }
        shapes
    };

    for w_a in [-3i64, -1, 0, 1, 7] {
        for w_b in [-3i64, -1, 0, 1, 7] {
            for (ia, (a_is_map, a)) in inputs.iter().enumerate() {
                for (ib, (b_is_map, b)) in inputs.iter().enumerate() {
                    let (weight, outcome) = weighted_intersection::<I32, I32>(
                        Some(a.as_ref()),
                        Some(b.as_ref()),
                        w_a,
                        w_b,
                    )
                    .unwrap();
                    let (want_weight, want) = model_weighted(
                        &shapes[ia].1,
                        *a_is_map,
                        &shapes[ib].1,
                        *b_is_map,
                        w_a,
                        w_b,
                        false,
                    );
                    assert_eq!(weight, want_weight);
                    assert_outcome(&outcome.unwrap(), &want);
                }
            }
        }
    }
}

#[test]
fn weighted_pass_through_keeps_the_given_weight() {
    let (weight, outcome) = weighted_union::<I32, I32>(None, None, 42, 666).unwrap();
    assert_eq!(weight, 0);
    assert!(outcome.is_none());

    for (_, operand) in &weighted_zoo(&A_ITEMS) {
        let (weight, outcome) =
            weighted_union::<I32, I32>(None, Some(operand.as_ref()), 42, 666).unwrap();
        assert_eq!(weight, 666);
        assert_eq!(outcome.unwrap().len(), A_ITEMS.len());

        let (weight, outcome) =
            weighted_intersection::<I32, I32>(Some(operand.as_ref()), None, 42, 666).unwrap();
        assert_eq!(weight, 42);
        assert_eq!(outcome.unwrap().len(), A_ITEMS.len());
    }

    // Empty containers still pass through whole.
    let empty: Bucket<I32, I32> = Bucket::new();
    let (weight, outcome) = weighted_union::<I32, I32>(Some(&empty), None, 7, 1).unwrap();
    assert_eq!(weight, 7);
    assert!(outcome.unwrap().is_empty());
}

#[test]
fn multiunion_is_the_pairwise_fold() {
    let sets: Vec<Set<I32>> = (0..6)
        .map(|i| (0..30).filter(|k| k % (i + 2) == 0).collect())
        .collect();
    let operands: Vec<&dyn SetOperand<I32>> =
        sets.iter().map(|s| s as &dyn SetOperand<I32>).collect();

    let folded = multiunion::<I32>(&operands);
    let mut pairwise: Option<Set<I32>> = None;
    for set in &sets {
        pairwise = union::<I32>(
            pairwise.as_ref().map(|s| s as &dyn SetOperand<I32>),
            Some(set),
        );
    }
    assert_eq!(keys_of(&folded), keys_of(&pairwise.unwrap()));
}

#[test]
fn multiunion_mixes_kinds_and_ignores_values() {
    let bucket: Bucket<I32, I32> = [(4, 400), (9, 900)].into_iter().collect();
    let tree: Tree<I32, I32> = [(1, -1), (4, -4)].into_iter().collect();
    let tree_set: TreeSet<I32> = [7, 2].into_iter().collect();
    let lone = Set::singleton(11);

    let folded = multiunion::<I32>(&[&bucket, &tree, &tree_set, &lone]);
    assert_eq!(keys_of(&folded), vec![1, 2, 4, 7, 9, 11]);

    assert!(multiunion::<I32>(&[]).is_empty());
}

#[test]
fn multiunion_swallows_many_small_inputs() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut keys: Vec<i32> = (0..900).collect();
    keys.shuffle(&mut rng);

    let little: Vec<Set<I32>> = keys.chunks(3).map(|c| c.iter().copied().collect()).collect();
    let operands: Vec<&dyn SetOperand<I32>> =
        little.iter().map(|s| s as &dyn SetOperand<I32>).collect();
    let folded = multiunion::<I32>(&operands);
    assert_eq!(keys_of(&folded), (0..900).collect::<Vec<_>>());
}

#[test]
fn operator_sugar_agrees_with_the_functions() {
    let a: Set<I32> = A_KEYS.into_iter().collect();
    let b: Set<I32> = B_KEYS.into_iter().collect();
    assert_eq!(keys_of(&(&a | &b)), naive_union(&A_KEYS, &B_KEYS));
    assert_eq!(keys_of(&(&a & &b)), naive_intersection(&A_KEYS, &B_KEYS));
    assert_eq!(keys_of(&(&a - &b)), naive_difference(&A_KEYS, &B_KEYS));
    let mut sym = naive_difference(&A_KEYS, &B_KEYS);
    sym.extend(naive_difference(&B_KEYS, &A_KEYS));
    sym.sort_unstable();
    assert_eq!(keys_of(&(&a ^ &b)), sym);

    let ta: TreeSet<I32> = A_KEYS.into_iter().collect();
    let tb: TreeSet<I32> = B_KEYS.into_iter().collect();
    assert_eq!(keys_of(&(&ta | &tb)), naive_union(&A_KEYS, &B_KEYS));
    assert_eq!(keys_of(&(&ta & &tb)), naive_intersection(&A_KEYS, &B_KEYS));
    assert_eq!(keys_of(&(&ta - &tb)), naive_difference(&A_KEYS, &B_KEYS));
}
