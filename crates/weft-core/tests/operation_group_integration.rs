//! Integration tests for the `operation_group` module: registration shapes,
//! continuation remigration, singleton groups, and priority-list motion.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use weft_core::operation::{AsyncOperation, OperationId};
use weft_core::operation_group::GroupRegistry;

fn rng(seed: u64) -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(seed)
}

fn enabled_of(ops: &[AsyncOperation]) -> BTreeSet<OperationId> {
    ops.iter().filter(|op| op.is_enabled()).map(|op| op.id).collect()
}

// ===========================================================================
// Registration shapes
// ===========================================================================

#[test]
fn owners_delays_and_threads_form_distinct_groups() {
    let mut registry = GroupRegistry::new();
    let mut rng = rng(42);

    let mut ops = vec![AsyncOperation::task_owner(1, 100), AsyncOperation::thread(2)];
    registry.observe(&mut ops, &mut rng);
    let mut ops = vec![
        AsyncOperation::task_owner(1, 100),
        AsyncOperation::thread(2),
        AsyncOperation::delay(3),
    ];
    registry.observe(&mut ops, &mut rng);

    // Task group, plain singleton, delay singleton.
    assert_eq!(registry.group_count(), 3);
    let groups: BTreeSet<_> = (1..=3)
        .map(|id| registry.group_of(id).expect("registered"))
        .collect();
    assert_eq!(groups.len(), 3);
}

#[test]
fn singletons_accumulate_later_arrivals() {
    let mut registry = GroupRegistry::new();
    let mut rng = rng(7);

    let mut ops = vec![AsyncOperation::thread(1), AsyncOperation::delay(2)];
    registry.observe(&mut ops, &mut rng);
    for id in 3..=6 {
        let next = if id % 2 == 0 {
            AsyncOperation::delay(id)
        } else {
            AsyncOperation::thread(id)
        };
        ops.push(next);
        registry.observe(&mut ops, &mut rng);
    }

    assert_eq!(registry.group_count(), 2);
    assert_eq!(registry.group_of(1), registry.group_of(3));
    assert_eq!(registry.group_of(1), registry.group_of(5));
    assert_eq!(registry.group_of(2), registry.group_of(4));
    assert_eq!(registry.group_of(2), registry.group_of(6));
    assert_ne!(registry.group_of(1), registry.group_of(2));
}

#[test]
fn random_priority_insertion_keeps_every_group_listed() {
    // Whatever positions the RNG picks, the priority list must stay a
    // permutation of the group arena.
    for seed in 0..20 {
        let mut registry = GroupRegistry::new();
        let mut rng = rng(seed);
        let mut ops = vec![AsyncOperation::task_owner(1, 10)];
        registry.observe(&mut ops, &mut rng);
        for id in 2..=6 {
            ops.push(AsyncOperation::task_owner(id, id * 10));
            registry.observe(&mut ops, &mut rng);
        }

        let mut listed: Vec<_> = registry.priority_order().to_vec();
        listed.sort_unstable();
        assert_eq!(listed, (0..registry.group_count()).collect::<Vec<_>>(), "seed {seed}");
    }
}

// ===========================================================================
// Continuation remigration
// ===========================================================================

#[test]
fn continuation_chain_stays_in_one_group() {
    let mut registry = GroupRegistry::new();
    let mut rng = rng(42);

    let mut ops = vec![AsyncOperation::task_owner(1, 5)];
    registry.observe(&mut ops, &mut rng);

    // A task awaited four times produces four continuations, each parented
    // by the previous one.
    for id in 2..=5 {
        ops.push(AsyncOperation::continuation(id, id - 1, 5));
        registry.observe(&mut ops, &mut rng);
    }

    assert_eq!(registry.group_count(), 1);
    let group = registry.group_of(1).unwrap();
    for id in 2..=5 {
        assert_eq!(registry.group_of(id), Some(group));
    }
    assert_eq!(registry.group(group).chain.len(), 5);
    assert_eq!(registry.group(group).owner, 1);
}

#[test]
fn remigration_follows_the_parent_across_groups() {
    let mut registry = GroupRegistry::new();
    let mut rng = rng(42);

    let mut ops = vec![
        AsyncOperation::task_owner(1, 10),
        AsyncOperation::task_owner(2, 20),
    ];
    registry.observe(&mut ops, &mut rng);
    ops.push(AsyncOperation::continuation(3, 1, 10));
    registry.observe(&mut ops, &mut rng);
    assert_eq!(registry.group_of(3), registry.group_of(1));

    // The runtime reports the continuation resumed under task 2's owner.
    ops[2].parent = Some(2);
    ops[2].continuation_handled = false;
    registry.observe(&mut ops, &mut rng);
    assert_eq!(registry.group_of(3), registry.group_of(2));

    // And back.
    ops[2].parent = Some(1);
    ops[2].continuation_handled = false;
    registry.observe(&mut ops, &mut rng);
    assert_eq!(registry.group_of(3), registry.group_of(1));
}

#[test]
fn every_operation_belongs_to_exactly_one_chain() {
    let mut registry = GroupRegistry::new();
    let mut rng = rng(1234);

    let mut ops = vec![
        AsyncOperation::task_owner(1, 10),
        AsyncOperation::task_owner(2, 20),
    ];
    registry.observe(&mut ops, &mut rng);
    ops.push(AsyncOperation::continuation(3, 1, 10));
    registry.observe(&mut ops, &mut rng);
    ops.push(AsyncOperation::continuation(4, 2, 20));
    registry.observe(&mut ops, &mut rng);

    // Bounce op 3 between parents a few times.
    for parent in [2, 1, 2] {
        ops[2].parent = Some(parent);
        ops[2].continuation_handled = false;
        registry.observe(&mut ops, &mut rng);
    }

    for id in 1..=4u64 {
        let home = registry.group_of(id).expect("registered");
        let mut appearances = 0;
        for index in 0..registry.group_count() {
            appearances += registry
                .group(index)
                .chain
                .iter()
                .filter(|&&member| member == id)
                .count();
        }
        assert_eq!(appearances, 1, "operation {id}");
        assert!(registry.group(home).chain.contains(&id));
    }
}

// ===========================================================================
// Priority-list motion
// ===========================================================================

#[test]
fn deprioritization_is_stable_for_the_rest() {
    let mut registry = GroupRegistry::new();
    let mut rng = rng(42);
    let mut ops = vec![
        AsyncOperation::task_owner(1, 10),
        AsyncOperation::task_owner(2, 20),
    ];
    registry.observe(&mut ops, &mut rng);
    ops.push(AsyncOperation::task_owner(3, 30));
    registry.observe(&mut ops, &mut rng);

    let order = registry.priority_order().to_vec();
    registry.deprioritize(order[0]);

    // The relative order of the untouched groups is preserved.
    assert_eq!(registry.priority_order()[0], order[1]);
    assert_eq!(registry.priority_order()[1], order[2]);
    assert_eq!(registry.priority_order()[2], order[0]);
}

#[test]
fn winner_scan_skips_groups_without_enabled_members() {
    let mut registry = GroupRegistry::new();
    let mut rng = rng(42);
    let mut ops = vec![
        AsyncOperation::task_owner(1, 10),
        AsyncOperation::task_owner(2, 20),
    ];
    registry.observe(&mut ops, &mut rng);
    ops.push(AsyncOperation::task_owner(3, 30));
    registry.observe(&mut ops, &mut rng);

    let order = registry.priority_order().to_vec();
    let top_owner = registry.group(order[0]).owner;
    let second_owner = registry.group(order[1]).owner;

    let enabled = enabled_of(&ops);
    assert_eq!(registry.highest_enabled_group(&enabled), Some(order[0]));

    let mut without_top = enabled.clone();
    without_top.remove(&top_owner);
    assert_eq!(registry.highest_enabled_group(&without_top), Some(order[1]));

    let mut only_third: BTreeSet<OperationId> = without_top;
    only_third.remove(&second_owner);
    assert_eq!(registry.highest_enabled_group(&only_third), Some(order[2]));
}
