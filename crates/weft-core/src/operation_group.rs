//! Task-operation groups and the priority list they are scheduled by.
//!
//! A logical asynchronous task is implemented by the runtime as a chain of
//! short-lived continuation operations. Grouping those continuations under
//! one priority-bearing entity is what makes priority-based exploration
//! bound the probability of missing a bug in terms of *tasks* rather than
//! continuations. The [`GroupRegistry`] owns that bookkeeping: an arena of
//! groups, a priority order over them, and the operation-to-group map.
//!
//! Ownership is arena-style — groups are indexed by position, operations
//! refer to groups through the membership map — so there are no cyclic
//! references between operations and groups.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::operation::{AsyncOperation, OperationId, TaskGroupId};

/// Arena index of a group within a [`GroupRegistry`].
pub type GroupIndex = usize;

// ---------------------------------------------------------------------------
// OperationGroup
// ---------------------------------------------------------------------------

/// A set of operations that together implement one logical asynchronous
/// task, holding a single scheduling priority.
///
/// The owner is the first operation registered for the group and is never
/// removed from the chain. `task_id` is `None` for the two singleton groups
/// that collect groupless operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationGroup {
    pub task_id: Option<TaskGroupId>,
    pub owner: OperationId,
    pub chain: Vec<OperationId>,
}

impl OperationGroup {
    fn new(task_id: Option<TaskGroupId>, owner: OperationId) -> Self {
        Self {
            task_id,
            owner,
            chain: vec![owner],
        }
    }

    /// Whether any operation of this group is in the enabled set.
    pub fn any_enabled(&self, enabled: &BTreeSet<OperationId>) -> bool {
        self.chain.iter().any(|op| enabled.contains(op))
    }
}

// ---------------------------------------------------------------------------
// GroupRegistry
// ---------------------------------------------------------------------------

/// Group bookkeeping shared by the priority-based strategies.
///
/// Groups live in an arena; `priority_order` holds arena indices with
/// position 0 as the highest priority. Every registered operation belongs to
/// exactly one group at a time.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: Vec<OperationGroup>,
    priority_order: Vec<GroupIndex>,
    membership: BTreeMap<OperationId, GroupIndex>,
    known: BTreeSet<OperationId>,
    task_groups: BTreeMap<TaskGroupId, GroupIndex>,
    plain_group: Option<GroupIndex>,
    delay_group: Option<GroupIndex>,
    first_observation: bool,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            first_observation: true,
            ..Self::default()
        }
    }

    /// Forget all groups and memberships. Called between iterations.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.priority_order.clear();
        self.membership.clear();
        self.known.clear();
        self.task_groups.clear();
        self.plain_group = None;
        self.delay_group = None;
        self.first_observation = true;
    }

    /// One bookkeeping pass over the complete candidate set: register
    /// operations seen for the first time and remigrate continuations whose
    /// state machine advanced since the previous scheduling point.
    ///
    /// # Panics
    ///
    /// Panics on runtime-adapter contract violations: more than one fresh
    /// operation between scheduling points (two are allowed at the very
    /// first, for the bootstrap pair), a continuation whose parent was never
    /// registered, or a duplicate owner for a task group. These indicate
    /// instrumentation bugs, not bugs in the program under test.
    pub fn observe<R: Rng>(&mut self, ops: &mut [AsyncOperation], rng: &mut R) {
        let mut fresh = 0usize;
        for op in ops.iter_mut() {
            if !self.known.contains(&op.id) {
                fresh += 1;
                self.register(op, rng);
            } else if !op.continuation_handled {
                self.remigrate(op, rng);
            }
        }

        let allowed = if self.first_observation { 2 } else { 1 };
        assert!(
            fresh <= allowed,
            "contract violation: {fresh} operations appeared between consecutive \
             scheduling points (at most {allowed} allowed here)"
        );
        self.first_observation = false;
    }

    fn register<R: Rng>(&mut self, op: &mut AsyncOperation, rng: &mut R) {
        match (op.group_id, op.is_group_owner, op.is_delay) {
            (Some(task), true, _) => {
                assert!(
                    !self.task_groups.contains_key(&task),
                    "contract violation: task group {task} registered a second owner \
                     (operation {})",
                    op.id
                );
                let index = self.groups.len();
                self.groups.push(OperationGroup::new(Some(task), op.id));
                self.task_groups.insert(task, index);
                self.membership.insert(op.id, index);
                self.insert_at_random_priority(index, rng);
                trace!(op = op.id, task, "registered task group owner");
            }
            (None, _, true) => {
                let index = self.delay_singleton(op.id, rng);
                self.groups[index].chain.push(op.id);
                self.membership.insert(op.id, index);
                trace!(op = op.id, "registered delay operation");
            }
            (None, _, false) => {
                let index = self.plain_singleton(op.id, rng);
                self.groups[index].chain.push(op.id);
                self.membership.insert(op.id, index);
                trace!(op = op.id, "registered groupless operation");
            }
            (Some(task), false, _) => {
                // A continuation joining its task: the parent identifies the
                // owning group.
                let parent = op.parent.unwrap_or_else(|| {
                    panic!(
                        "contract violation: continuation {} of task group {task} has no parent",
                        op.id
                    )
                });
                let index = *self.membership.get(&parent).unwrap_or_else(|| {
                    panic!(
                        "contract violation: continuation {} resumed by unregistered \
                         parent {parent}",
                        op.id
                    )
                });
                let at = rng.gen_range(0..=self.groups[index].chain.len());
                self.groups[index].chain.insert(at, op.id);
                self.membership.insert(op.id, index);
                op.continuation_handled = true;
                trace!(op = op.id, parent, "continuation joined parent group");
            }
        }
        self.known.insert(op.id);
    }

    /// Move an advanced continuation into the group of its current parent.
    /// The owner operation of a group is pinned and never remigrates.
    fn remigrate<R: Rng>(&mut self, op: &mut AsyncOperation, rng: &mut R) {
        let current = self.membership[&op.id];
        if self.groups[current].owner == op.id {
            op.continuation_handled = true;
            return;
        }
        let parent = op.parent.unwrap_or_else(|| {
            panic!("contract violation: operation {} advanced without a parent", op.id)
        });
        let target = *self.membership.get(&parent).unwrap_or_else(|| {
            panic!(
                "contract violation: operation {} remigrated to unregistered parent {parent}",
                op.id
            )
        });

        let chain = &mut self.groups[current].chain;
        if let Some(pos) = chain.iter().position(|&member| member == op.id) {
            chain.remove(pos);
        }
        let chain = &mut self.groups[target].chain;
        let at = rng.gen_range(0..=chain.len());
        chain.insert(at, op.id);
        self.membership.insert(op.id, target);
        op.continuation_handled = true;
        trace!(op = op.id, parent, "continuation remigrated to parent group");
    }

    fn delay_singleton<R: Rng>(&mut self, owner: OperationId, rng: &mut R) -> GroupIndex {
        if let Some(index) = self.delay_group {
            return index;
        }
        let index = self.groups.len();
        self.groups.push(OperationGroup {
            task_id: None,
            owner,
            chain: Vec::new(),
        });
        self.delay_group = Some(index);
        self.insert_at_random_priority(index, rng);
        index
    }

    fn plain_singleton<R: Rng>(&mut self, owner: OperationId, rng: &mut R) -> GroupIndex {
        if let Some(index) = self.plain_group {
            return index;
        }
        let index = self.groups.len();
        self.groups.push(OperationGroup {
            task_id: None,
            owner,
            chain: Vec::new(),
        });
        self.plain_group = Some(index);
        self.insert_at_random_priority(index, rng);
        index
    }

    fn insert_at_random_priority<R: Rng>(&mut self, group: GroupIndex, rng: &mut R) {
        let position = if self.priority_order.is_empty() {
            0
        } else {
            rng.gen_range(0..=self.priority_order.len())
        };
        self.priority_order.insert(position, group);
    }

    /// Demote a group to the lowest priority.
    pub fn deprioritize(&mut self, group: GroupIndex) {
        if let Some(pos) = self.priority_order.iter().position(|&g| g == group) {
            self.priority_order.remove(pos);
            self.priority_order.push(group);
            trace!(group, "group deprioritized to tail");
        }
    }

    /// The first group in priority order with at least one enabled member.
    pub fn highest_enabled_group(&self, enabled: &BTreeSet<OperationId>) -> Option<GroupIndex> {
        self.priority_order
            .iter()
            .copied()
            .find(|&g| self.groups[g].any_enabled(enabled))
    }

    /// Enabled members of a group, in chain order.
    pub fn enabled_members(
        &self,
        group: GroupIndex,
        enabled: &BTreeSet<OperationId>,
    ) -> Vec<OperationId> {
        self.groups[group]
            .chain
            .iter()
            .copied()
            .filter(|op| enabled.contains(op))
            .collect()
    }

    /// Group an operation currently belongs to.
    pub fn group_of(&self, op: OperationId) -> Option<GroupIndex> {
        self.membership.get(&op).copied()
    }

    /// Whether the operation has been registered this iteration.
    pub fn is_known(&self, op: OperationId) -> bool {
        self.known.contains(&op)
    }

    pub fn group(&self, index: GroupIndex) -> &OperationGroup {
        &self.groups[index]
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Current priority order, highest first.
    pub fn priority_order(&self) -> &[GroupIndex] {
        &self.priority_order
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
