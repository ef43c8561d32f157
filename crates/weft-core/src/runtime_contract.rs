//! The contract between the controlled runtime and the strategies.
//!
//! The strategies are sound only if the host runtime maintains its side of
//! the operation table: exactly one operation executes between scheduling
//! points, at most one fresh operation appears per point (two at the very
//! first, for the bootstrap pair), the candidate set is complete, and
//! continuation resumption is reported before the next scheduling point.
//!
//! [`OperationRegistry`] is the host-side table a runtime adapter maintains;
//! [`ContractChecker`] validates the obligations that used to live as debug
//! assertions inside the strategies, so adapter test suites can verify them
//! as ordinary results instead of aborts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::operation::{
    AsyncOperation, OperationId, OperationKind, OperationScope, OperationStatus, TaskGroupId,
};

// ---------------------------------------------------------------------------
// ContractViolation
// ---------------------------------------------------------------------------

/// A runtime-adapter bug observed at the strategy boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ContractViolation {
    #[error(
        "{count} fresh operations {ids:?} appeared between consecutive scheduling points \
         (at most {allowed} allowed here)"
    )]
    TooManyNewOperations {
        count: usize,
        allowed: usize,
        ids: Vec<OperationId>,
    },
    #[error("operation {op} is not in the operation table")]
    UnknownOperation { op: OperationId },
    #[error("operation {op} resumed under unknown parent {parent}")]
    UnknownParent { op: OperationId, parent: OperationId },
    #[error("live operation {op} is missing from the candidate set")]
    MissingCandidate { op: OperationId },
}

// ---------------------------------------------------------------------------
// OperationRegistry — the host-side operation table
// ---------------------------------------------------------------------------

/// Operation table maintained by the runtime adapter.
///
/// Identities are handed out sequentially and never reused within an
/// iteration. The table owns the operations; the strategies borrow the
/// candidate slice at each scheduling point.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    ops: Vec<AsyncOperation>,
    next_id: OperationId,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            next_id: 1,
        }
    }

    fn push(&mut self, op: AsyncOperation) -> OperationId {
        let id = op.id;
        self.ops.push(op);
        self.next_id += 1;
        id
    }

    /// Create the owner operation of a new logical task.
    pub fn create_task_owner(&mut self, group: TaskGroupId) -> OperationId {
        let op = AsyncOperation::task_owner(self.next_id, group);
        self.push(op)
    }

    /// Create a continuation of `parent`, inheriting its task group.
    pub fn create_continuation(
        &mut self,
        parent: OperationId,
    ) -> Result<OperationId, ContractViolation> {
        let parent_group = self
            .get(parent)
            .ok_or(ContractViolation::UnknownOperation { op: parent })?
            .group_id;
        let id = match parent_group {
            Some(group) => {
                let op = AsyncOperation::continuation(self.next_id, parent, group);
                self.push(op)
            }
            None => {
                // Continuation of a groupless operation stays groupless.
                let mut op = AsyncOperation::thread(self.next_id);
                op.parent = Some(parent);
                op.is_continuation = true;
                self.push(op)
            }
        };
        Ok(id)
    }

    /// Create a plain thread outside any task group.
    pub fn create_thread(&mut self) -> OperationId {
        let op = AsyncOperation::thread(self.next_id);
        self.push(op)
    }

    /// Create a timed delay.
    pub fn create_delay(&mut self) -> OperationId {
        let op = AsyncOperation::delay(self.next_id);
        self.push(op)
    }

    /// Report a state-machine advance: `op` was resumed under `new_parent`.
    /// Must be called before the next scheduling point so the strategy can
    /// remigrate the operation into its parent's group.
    pub fn notify_continuation(
        &mut self,
        op: OperationId,
        new_parent: OperationId,
    ) -> Result<(), ContractViolation> {
        if self.get(new_parent).is_none() {
            return Err(ContractViolation::UnknownParent {
                op,
                parent: new_parent,
            });
        }
        let entry = self
            .get_mut(op)
            .ok_or(ContractViolation::UnknownOperation { op })?;
        entry.parent = Some(new_parent);
        entry.continuation_handled = false;
        trace!(op, parent = new_parent, "continuation advance recorded");
        Ok(())
    }

    pub fn set_status(
        &mut self,
        op: OperationId,
        status: OperationStatus,
    ) -> Result<(), ContractViolation> {
        self.get_mut(op)
            .ok_or(ContractViolation::UnknownOperation { op })?
            .status = status;
        Ok(())
    }

    /// Tag the operation with what it is about to do at its next decision
    /// point.
    pub fn set_kind(
        &mut self,
        op: OperationId,
        kind: OperationKind,
    ) -> Result<(), ContractViolation> {
        self.get_mut(op)
            .ok_or(ContractViolation::UnknownOperation { op })?
            .kind = kind;
        Ok(())
    }

    /// Mark entry into a monitor-style critical section.
    pub fn enter_synchronized(&mut self, op: OperationId) -> Result<(), ContractViolation> {
        self.get_mut(op)
            .ok_or(ContractViolation::UnknownOperation { op })?
            .scope = OperationScope::Synchronized;
        Ok(())
    }

    /// Mark exit from a monitor-style critical section.
    pub fn exit_synchronized(&mut self, op: OperationId) -> Result<(), ContractViolation> {
        self.get_mut(op)
            .ok_or(ContractViolation::UnknownOperation { op })?
            .scope = OperationScope::Default;
        Ok(())
    }

    pub fn complete(&mut self, op: OperationId) -> Result<(), ContractViolation> {
        self.set_status(op, OperationStatus::Completed)
    }

    pub fn get(&self, op: OperationId) -> Option<&AsyncOperation> {
        self.ops.iter().find(|candidate| candidate.id == op)
    }

    fn get_mut(&mut self, op: OperationId) -> Option<&mut AsyncOperation> {
        self.ops.iter_mut().find(|candidate| candidate.id == op)
    }

    /// The complete candidate set for the next scheduling point.
    pub fn candidates(&mut self) -> &mut [AsyncOperation] {
        &mut self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drop all operations at iteration end.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.next_id = 1;
    }
}

// ---------------------------------------------------------------------------
// ContractChecker — adapter-side validation
// ---------------------------------------------------------------------------

/// Validates the candidate-set obligations between consecutive scheduling
/// points: at most one fresh operation (two at the very first point) and no
/// live operation silently dropped.
#[derive(Debug, Default)]
pub struct ContractChecker {
    seen: BTreeSet<OperationId>,
    live: BTreeSet<OperationId>,
    first_point: bool,
}

impl ContractChecker {
    pub fn new() -> Self {
        Self {
            seen: BTreeSet::new(),
            live: BTreeSet::new(),
            first_point: true,
        }
    }

    /// Check one candidate set. Call once per scheduling point, before
    /// handing the set to the strategy.
    pub fn check(&mut self, ops: &[AsyncOperation]) -> Result<(), ContractViolation> {
        let present: BTreeSet<OperationId> = ops.iter().map(|op| op.id).collect();

        let fresh: Vec<OperationId> =
            present.iter().copied().filter(|id| !self.seen.contains(id)).collect();
        let allowed = if self.first_point { 2 } else { 1 };
        if fresh.len() > allowed {
            return Err(ContractViolation::TooManyNewOperations {
                count: fresh.len(),
                allowed,
                ids: fresh,
            });
        }

        if let Some(&missing) = self.live.iter().find(|id| !present.contains(id)) {
            return Err(ContractViolation::MissingCandidate { op: missing });
        }

        self.seen.extend(present.iter().copied());
        self.live = ops
            .iter()
            .filter(|op| op.status != OperationStatus::Completed)
            .map(|op| op.id)
            .collect();
        self.first_point = false;
        Ok(())
    }

    /// Forget everything at iteration end.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.live.clear();
        self.first_point = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- OperationRegistry --

    #[test]
    fn ids_are_sequential_from_one() {
        let mut registry = OperationRegistry::new();
        assert_eq!(registry.create_thread(), 1);
        assert_eq!(registry.create_task_owner(7), 2);
        assert_eq!(registry.create_delay(), 3);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn task_owner_shape() {
        let mut registry = OperationRegistry::new();
        let id = registry.create_task_owner(7);
        let op = registry.get(id).unwrap();
        assert_eq!(op.group_id, Some(7));
        assert!(op.is_group_owner);
    }

    #[test]
    fn continuation_inherits_parent_group() {
        let mut registry = OperationRegistry::new();
        let owner = registry.create_task_owner(7);
        let continuation = registry.create_continuation(owner).unwrap();
        let op = registry.get(continuation).unwrap();
        assert_eq!(op.group_id, Some(7));
        assert_eq!(op.parent, Some(owner));
        assert!(op.is_continuation);
        assert!(!op.continuation_handled);
    }

    #[test]
    fn continuation_of_groupless_parent_is_groupless() {
        let mut registry = OperationRegistry::new();
        let thread = registry.create_thread();
        let continuation = registry.create_continuation(thread).unwrap();
        let op = registry.get(continuation).unwrap();
        assert_eq!(op.group_id, None);
        assert_eq!(op.parent, Some(thread));
        assert!(op.is_continuation);
    }

    #[test]
    fn continuation_of_unknown_parent_is_an_error() {
        let mut registry = OperationRegistry::new();
        assert_eq!(
            registry.create_continuation(99).unwrap_err(),
            ContractViolation::UnknownOperation { op: 99 }
        );
    }

    #[test]
    fn notify_continuation_rewrites_parent_and_clears_flag() {
        let mut registry = OperationRegistry::new();
        let a = registry.create_task_owner(1);
        let b = registry.create_task_owner(2);
        let c = registry.create_continuation(a).unwrap();

        registry.notify_continuation(c, b).unwrap();
        let op = registry.get(c).unwrap();
        assert_eq!(op.parent, Some(b));
        assert!(!op.continuation_handled);
    }

    #[test]
    fn notify_continuation_validates_both_ends() {
        let mut registry = OperationRegistry::new();
        let a = registry.create_thread();
        assert_eq!(
            registry.notify_continuation(a, 42).unwrap_err(),
            ContractViolation::UnknownParent { op: a, parent: 42 }
        );
        assert_eq!(
            registry.notify_continuation(42, a).unwrap_err(),
            ContractViolation::UnknownOperation { op: 42 }
        );
    }

    #[test]
    fn synchronized_scope_toggles() {
        let mut registry = OperationRegistry::new();
        let id = registry.create_thread();
        registry.enter_synchronized(id).unwrap();
        assert_eq!(registry.get(id).unwrap().scope, OperationScope::Synchronized);
        registry.exit_synchronized(id).unwrap();
        assert_eq!(registry.get(id).unwrap().scope, OperationScope::Default);
    }

    #[test]
    fn status_transitions_and_completion() {
        let mut registry = OperationRegistry::new();
        let id = registry.create_thread();
        registry.set_status(id, OperationStatus::BlockedOnReceive).unwrap();
        assert_eq!(registry.get(id).unwrap().status, OperationStatus::BlockedOnReceive);
        registry.complete(id).unwrap();
        assert_eq!(registry.get(id).unwrap().status, OperationStatus::Completed);
    }

    #[test]
    fn clear_empties_the_table() {
        let mut registry = OperationRegistry::new();
        registry.create_thread();
        registry.clear();
        assert!(registry.is_empty());
        // Identities restart after clear.
        assert_eq!(registry.create_thread(), 1);
    }

    // -- ContractChecker --

    fn thread(id: OperationId) -> AsyncOperation {
        AsyncOperation::thread(id)
    }

    #[test]
    fn bootstrap_pair_is_allowed() {
        let mut checker = ContractChecker::new();
        assert!(checker.check(&[thread(1), thread(2)]).is_ok());
    }

    #[test]
    fn three_fresh_at_bootstrap_is_a_violation() {
        let mut checker = ContractChecker::new();
        let err = checker.check(&[thread(1), thread(2), thread(3)]).unwrap_err();
        assert!(matches!(
            err,
            ContractViolation::TooManyNewOperations { count: 3, allowed: 2, .. }
        ));
    }

    #[test]
    fn one_fresh_per_point_after_bootstrap() {
        let mut checker = ContractChecker::new();
        checker.check(&[thread(1)]).unwrap();
        checker.check(&[thread(1), thread(2)]).unwrap();
        let err = checker
            .check(&[thread(1), thread(2), thread(3), thread(4)])
            .unwrap_err();
        assert!(matches!(
            err,
            ContractViolation::TooManyNewOperations { count: 2, allowed: 1, .. }
        ));
    }

    #[test]
    fn dropping_a_live_operation_is_a_violation() {
        let mut checker = ContractChecker::new();
        checker.check(&[thread(1), thread(2)]).unwrap();
        assert_eq!(
            checker.check(&[thread(1)]).unwrap_err(),
            ContractViolation::MissingCandidate { op: 2 }
        );
    }

    #[test]
    fn completed_operations_may_be_dropped() {
        let mut checker = ContractChecker::new();
        let mut done = thread(2);
        done.status = OperationStatus::Completed;
        checker.check(&[thread(1), done]).unwrap();
        assert!(checker.check(&[thread(1)]).is_ok());
    }

    #[test]
    fn reset_restores_the_bootstrap_allowance() {
        let mut checker = ContractChecker::new();
        checker.check(&[thread(1)]).unwrap();
        checker.reset();
        assert!(checker.check(&[thread(1), thread(2)]).is_ok());
    }

    // -- Violation formatting and serde --

    #[test]
    fn violation_display() {
        let violation = ContractViolation::TooManyNewOperations {
            count: 3,
            allowed: 1,
            ids: vec![4, 5, 6],
        };
        let text = violation.to_string();
        assert!(text.contains("3 fresh operations"));
        assert!(text.contains("at most 1"));

        assert!(
            ContractViolation::MissingCandidate { op: 9 }
                .to_string()
                .contains("operation 9")
        );
    }

    #[test]
    fn violation_serde_round_trip() {
        let violations = [
            ContractViolation::TooManyNewOperations {
                count: 2,
                allowed: 1,
                ids: vec![3, 4],
            },
            ContractViolation::UnknownOperation { op: 1 },
            ContractViolation::UnknownParent { op: 1, parent: 2 },
            ContractViolation::MissingCandidate { op: 5 },
        ];
        for violation in &violations {
            let json = serde_json::to_string(violation).expect("serialize");
            let restored: ContractViolation = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(*violation, restored);
        }
    }
}
