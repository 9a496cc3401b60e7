use std::collections::BTreeSet;

use super::*;
use crate::event::EventKind;

/// Scenario tree: order 4 after inserting 10..=50
fn five_keys() -> BPlusTree<i64> {
    let mut tree = BPlusTree::new(4).unwrap();
    for key in [10, 20, 30, 40, 50] {
        tree.insert(key).unwrap();
    }
    tree
}

/// Small deterministic generator for the invariant sweeps
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: u64) -> i64 {
        (self.next() % bound) as i64
    }
}

#[test]
fn test_new_tree() {
    let tree: BPlusTree<i64> = BPlusTree::new(4).unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.element_count(), 0);
    assert_eq!(tree.order(), 4);
    assert_eq!(tree.max_keys(), 3);
    assert_eq!(tree.min_keys(), 1);
    assert!(tree.validate().is_ok());
}

#[test]
fn test_invalid_order() {
    for order in 0..3 {
        assert_eq!(
            BPlusTree::<i64>::new(order).unwrap_err(),
            TreeError::InvalidConfiguration {
                variant: "B+ tree order",
                value: order,
                minimum: 3,
            }
        );
    }
    assert!(BPlusTree::<i64>::new(3).is_ok());
}

#[test]
fn test_min_keys_by_order() {
    let mins: Vec<usize> = (3..=8)
        .map(|order| BPlusTree::<i64>::new(order).unwrap().min_keys())
        .collect();
    assert_eq!(mins, vec![1, 1, 2, 2, 3, 3]);
}

#[test]
fn test_multiple_inserts_no_split() {
    let mut tree = BPlusTree::new(4).unwrap();

    // Order 4 means max 3 keys per leaf
    tree.insert(10).unwrap();
    tree.insert(20).unwrap();
    tree.insert(30).unwrap();

    assert_eq!(tree.height(), 1);
    assert_eq!(tree.levels().unwrap(), vec![vec![vec![10, 20, 30]]]);
    assert!(tree.contains(&20));
    assert!(!tree.contains(&25));
}

#[test]
fn test_insert_five_splits_root_once() {
    let tree = five_keys();

    assert_eq!(tree.ordered_sequence(), vec![10, 20, 30, 40, 50]);
    assert_eq!(tree.height(), 2);
    assert_eq!(
        tree.levels().unwrap(),
        vec![vec![vec![30]], vec![vec![10, 20], vec![30, 40, 50]]]
    );
    let splits = tree
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::Split)
        .count();
    assert_eq!(splits, 1);
    assert!(tree.validate().is_ok());
}

#[test]
fn test_delete_without_underflow() {
    let mut tree = five_keys();
    tree.delete(&30).unwrap();

    assert_eq!(tree.ordered_sequence(), vec![10, 20, 40, 50]);
    // Separator follows the new smallest key of the right leaf
    assert_eq!(
        tree.levels().unwrap(),
        vec![vec![vec![40]], vec![vec![10, 20], vec![40, 50]]]
    );
    let kinds = tree.events().kinds();
    assert!(!kinds.contains(&EventKind::Merge));
    assert!(!kinds.contains(&EventKind::Borrow));
    assert!(tree.validate().is_ok());
}

#[test]
fn test_duplicate_insert_rejected() {
    let mut tree = BPlusTree::new(4).unwrap();
    tree.insert(10).unwrap();
    let count = tree.element_count();
    let levels = tree.levels().unwrap();

    assert_eq!(
        tree.insert(10),
        Err(TreeError::DuplicateKey("10".to_string()))
    );
    assert_eq!(tree.element_count(), count);
    assert_eq!(tree.levels().unwrap(), levels);
    assert_eq!(tree.events().last().unwrap().kind, EventKind::Error);
}

#[test]
fn test_delete_missing_key() {
    let mut tree = five_keys();
    let levels = tree.levels().unwrap();

    assert_eq!(
        tree.delete(&35),
        Err(TreeError::KeyNotFound("35".to_string()))
    );
    assert_eq!(tree.levels().unwrap(), levels);
    assert_eq!(tree.events().last().unwrap().kind, EventKind::Error);
}

#[test]
fn test_insert_event_order() {
    let mut tree = BPlusTree::new(4).unwrap();
    for key in [10, 20, 30] {
        tree.insert(key).unwrap();
    }
    let mark = tree.events().mark();
    tree.insert(40).unwrap();

    let kinds: Vec<EventKind> = tree.events().since(mark).map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Insert,
            EventKind::Info,
            EventKind::Split,
            EventKind::Insert
        ]
    );
    let split = tree.events().since(mark).nth(2).unwrap();
    assert_eq!(split.message, "split leaf: [10, 20] -> [30]");
}

#[test]
fn test_borrow_from_right_leaf() {
    let mut tree = five_keys();
    tree.delete(&10).unwrap();
    tree.delete(&20).unwrap();

    assert_eq!(
        tree.levels().unwrap(),
        vec![vec![vec![40]], vec![vec![30], vec![40, 50]]]
    );
    assert_eq!(tree.events().last().unwrap().kind, EventKind::Borrow);
    assert!(tree.validate().is_ok());
}

#[test]
fn test_borrow_from_left_leaf() {
    let mut tree = five_keys();
    tree.delete(&50).unwrap();
    tree.delete(&40).unwrap();
    tree.delete(&30).unwrap();

    assert_eq!(
        tree.levels().unwrap(),
        vec![vec![vec![20]], vec![vec![10], vec![20]]]
    );
    assert!(tree.events().kinds().contains(&EventKind::Borrow));
    assert!(tree.validate().is_ok());
}

#[test]
fn test_merge_collapses_root() {
    let mut tree = five_keys();
    for key in [10, 20, 30] {
        tree.delete(&key).unwrap();
    }
    let mark = tree.events().mark();
    tree.delete(&40).unwrap();

    assert_eq!(tree.levels().unwrap(), vec![vec![vec![50]]]);
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.node_count(), 1);

    let kinds: Vec<EventKind> = tree.events().since(mark).map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Delete,
            EventKind::Delete,
            EventKind::Merge,
            EventKind::Info
        ]
    );
    assert!(tree.validate().is_ok());
}

#[test]
fn test_delete_everything() {
    let mut tree = BPlusTree::new(4).unwrap();
    for key in 1..=40 {
        tree.insert(key).unwrap();
    }
    for key in 1..=40 {
        tree.delete(&key).unwrap();
        tree.validate().unwrap();
    }

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_search_reports_leaf_location() {
    let tree = five_keys();

    let location = tree.search(&40).unwrap();
    assert_eq!(location.path, vec![1]);
    assert_eq!(location.index, 1);
    assert!(tree.get_node(location.node).unwrap().is_leaf());

    // A separator value is found in its leaf, never in the internal node
    let separator = tree.search(&30).unwrap();
    assert_eq!(separator.path, vec![1]);
    assert_eq!(separator.index, 0);

    assert_eq!(tree.search(&35), None);
}

#[test]
fn test_find_records_events() {
    let mut tree = five_keys();

    let location = tree.find(&20).unwrap();
    assert_eq!(location.path, vec![0]);
    assert_eq!(tree.events().last().unwrap().kind, EventKind::Info);

    assert_eq!(
        tree.find(&99),
        Err(TreeError::KeyNotFound("99".to_string()))
    );
    assert_eq!(tree.events().last().unwrap().kind, EventKind::Error);
}

#[test]
fn test_round_trip() {
    let mut tree = BPlusTree::new(5).unwrap();
    for key in (0..60).rev() {
        tree.insert(key).unwrap();
        assert!(tree.contains(&key));
    }
    for key in (0..60).step_by(3) {
        tree.delete(&key).unwrap();
        assert!(!tree.contains(&key));
    }
    tree.validate().unwrap();
}

#[test]
fn test_iter_walks_leaf_chain() {
    let mut tree = BPlusTree::new(3).unwrap();
    for key in [50, 10, 40, 20, 30, 60, 5] {
        tree.insert(key).unwrap();
    }

    let keys: Vec<i64> = tree.iter().copied().collect();
    assert_eq!(keys, vec![5, 10, 20, 30, 40, 50, 60]);
    assert_eq!(tree.ordered_sequence(), keys);
    tree.validate().unwrap();
}

#[test]
fn test_stats() {
    let tree = five_keys();
    let stats = tree.stats();

    assert_eq!(stats.variant, "B+ tree");
    assert_eq!(stats.fanout, 4);
    assert_eq!(stats.height, 2);
    assert_eq!(stats.node_count, 3);
    // Separators count as stored keys
    assert_eq!(stats.element_count, 6);
    assert_eq!(stats.min_keys, 1);
    assert_eq!(stats.max_keys, 3);
    assert_eq!(stats.leaf_values, Some(5));
}

#[test]
fn test_height_monotonic() {
    let mut tree = BPlusTree::new(4).unwrap();
    let mut height = tree.height();
    for key in 0..100 {
        tree.insert(key).unwrap();
        assert!(tree.height() >= height);
        height = tree.height();
    }
    for key in 0..100 {
        tree.delete(&key).unwrap();
        let now = tree.height();
        assert!(now <= height && height - now <= 1);
        height = now;
    }
}

#[test]
fn test_height_moves_one_level_at_a_time() {
    for order in 3..=6 {
        for seed in 1..=4u64 {
            let mut rng = XorShift(seed.wrapping_mul(0x2545_F491_4F6C_DD1D) ^ order as u64);
            let mut tree = BPlusTree::new(order).unwrap();

            for step in 0..1500 {
                let key = rng.below(300);
                let before = tree.height();
                if rng.below(2) == 0 {
                    let _ = tree.insert(key);
                    assert!(tree.height() >= before, "order {order}, seed {seed}, step {step}");
                } else {
                    let _ = tree.delete(&key);
                    let after = tree.height();
                    assert!(
                        after <= before && before - after <= 1,
                        "order {order}, seed {seed}, step {step}: delete {key} took height {before} -> {after}"
                    );
                }
            }
            tree.validate().unwrap();
        }
    }
}

#[test]
fn test_order_three_split_half_is_refilled() {
    let mut tree = BPlusTree::new(3).unwrap();
    for key in 1..=7 {
        tree.insert(key).unwrap();
    }
    assert_eq!(
        tree.levels().unwrap(),
        vec![
            vec![vec![3, 5]],
            vec![vec![2], vec![4], vec![6]],
            vec![vec![1], vec![2], vec![3], vec![4], vec![5], vec![6, 7]],
        ]
    );

    // The full root splits, leaving a right half without keys; the insert
    // merges it back since nothing below needed the room
    let mark = tree.events().mark();
    tree.insert(0).unwrap();

    let kinds: Vec<EventKind> = tree.events().since(mark).map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Insert,
            EventKind::Info,
            EventKind::Split,
            EventKind::Insert,
            EventKind::Merge,
            EventKind::Info,
        ]
    );
    assert_eq!(tree.height(), 3);
    assert_eq!(
        tree.levels().unwrap(),
        vec![
            vec![vec![3, 5]],
            vec![vec![2], vec![4], vec![6]],
            vec![vec![0, 1], vec![2], vec![3], vec![4], vec![5], vec![6, 7]],
        ]
    );
    tree.validate().unwrap();
}

#[test]
fn test_reset() {
    let mut tree = five_keys();
    tree.reset();

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.first_leaf_id(), tree.root_node_id());
    assert_eq!(tree.events().last().unwrap().message, "tree reset");
    tree.validate().unwrap();

    tree.insert(7).unwrap();
    assert_eq!(tree.ordered_sequence(), vec![7]);
}

#[test]
fn test_load_sample() {
    let mut tree: BPlusTree<i64> = BPlusTree::new(4).unwrap();
    tree.insert(3).unwrap();
    tree.load_sample().unwrap();

    let expected: Vec<i64> = (1..=12).map(|n| n * 10).collect();
    assert_eq!(tree.ordered_sequence(), expected);
    assert_eq!(tree.events().iter().next().unwrap().message, "loading sample data");
    assert_eq!(tree.events().last().unwrap().message, "sample data loaded");
    assert!(!tree.events().iter().any(|e| e.message.contains("value 3")));
    tree.validate().unwrap();
}

#[test]
fn test_default_history_is_capped() {
    let mut tree = BPlusTree::new(4).unwrap();
    for key in 0..100 {
        tree.insert(key).unwrap();
    }

    assert_eq!(tree.events().retention(), Retention::Latest(DEFAULT_HISTORY));
    assert_eq!(tree.events().len(), DEFAULT_HISTORY);
}

#[test]
fn test_unbounded_history() {
    let mut tree = BPlusTree::with_retention(4, Retention::Unbounded).unwrap();
    for key in 0..100 {
        tree.insert(key).unwrap();
    }
    assert!(tree.events().len() > DEFAULT_HISTORY);
}

#[test]
fn test_order_three_ascending_and_descending() {
    let mut tree = BPlusTree::new(3).unwrap();
    for key in 1..=30 {
        tree.insert(key).unwrap();
        tree.validate().unwrap();
    }
    for key in (1..=30).rev() {
        tree.delete(&key).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.ordered_sequence(), (1..key).collect::<Vec<i64>>());
    }
    assert!(tree.is_empty());
}

#[test]
fn test_random_operations_keep_invariants() {
    for order in 3..=7 {
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15 ^ order as u64);
        let mut tree = BPlusTree::new(order).unwrap();
        let mut model = BTreeSet::new();

        for _ in 0..600 {
            let key = rng.below(200);
            let inserting = rng.below(3) != 0;

            if inserting {
                let result = tree.insert(key);
                assert_eq!(result.is_ok(), model.insert(key), "order {order}, insert {key}");
            } else {
                let result = tree.delete(&key);
                assert_eq!(result.is_ok(), model.remove(&key), "order {order}, delete {key}");
            }

            if let Err(err) = tree.validate() {
                panic!("order {order}: invalid after touching {key}: {err}");
            }
            assert_eq!(
                tree.ordered_sequence(),
                model.iter().copied().collect::<Vec<_>>()
            );
        }

        // Drain in a scrambled order
        let mut remaining: Vec<i64> = model.iter().copied().collect();
        while !remaining.is_empty() {
            let key = remaining.swap_remove(rng.below(remaining.len() as u64) as usize);
            tree.delete(&key).unwrap();
            tree.validate().unwrap();
        }
        assert!(tree.is_empty());
    }
}
