//! Operation model for the exploration core.
//!
//! An [`AsyncOperation`] is the unit of concurrency a scheduling strategy
//! chooses between: a thread, a task continuation, or a timed delay. The
//! controlled runtime owns the operation table and moves `status`; the
//! strategies only read it — with the single exception of
//! `continuation_handled`, which a strategy sets back to `true` once it has
//! folded a resumed continuation into its owning group.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable operation identity within one iteration.
pub type OperationId = u64;

/// Logical task identity shared by an owner operation and its continuations.
pub type TaskGroupId = u64;

// ---------------------------------------------------------------------------
// OperationStatus — scheduling eligibility
// ---------------------------------------------------------------------------

/// Scheduling status of an operation. Only `Enabled` operations are
/// eligible for selection; the blocked variants record what the operation
/// is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Created but not yet runnable.
    None,
    /// Eligible for scheduling.
    Enabled,
    /// Waiting on a timed delay.
    Delayed,
    /// Waiting for all of a set of operations to complete.
    BlockedOnWaitAll,
    /// Waiting for any of a set of operations to complete.
    BlockedOnWaitAny,
    /// Waiting to acquire a resource (lock, semaphore slot).
    BlockedOnResource,
    /// Waiting to receive a message.
    BlockedOnReceive,
    /// Finished; never scheduled again.
    Completed,
}

impl OperationStatus {
    /// Whether this operation may be handed back to the runtime.
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }

    /// Whether the operation is parked on some wait condition.
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            Self::Delayed
                | Self::BlockedOnWaitAll
                | Self::BlockedOnWaitAny
                | Self::BlockedOnResource
                | Self::BlockedOnReceive
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Enabled => f.write_str("enabled"),
            Self::Delayed => f.write_str("delayed"),
            Self::BlockedOnWaitAll => f.write_str("blocked_on_wait_all"),
            Self::BlockedOnWaitAny => f.write_str("blocked_on_wait_any"),
            Self::BlockedOnResource => f.write_str("blocked_on_resource"),
            Self::BlockedOnReceive => f.write_str("blocked_on_receive"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationKind — taxonomy observed by strategies
// ---------------------------------------------------------------------------

/// Taxonomy tag describing what an operation does at its current decision
/// point. Strategies treat this as opaque except for the synchronization
/// subset, which drives change-point placement in the PCT-CP variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Ordinary scheduling point.
    Default,
    /// First decision point of a fresh operation.
    Start,
    /// Creation of a child operation.
    Create,
    /// Join on another operation's completion.
    Join,
    /// Voluntary yield back to the scheduler.
    Yield,
    /// Message send.
    Send,
    /// Message receive.
    Receive,
    /// Lock or monitor acquisition.
    Acquire,
    /// Lock or monitor release.
    Release,
}

impl OperationKind {
    /// Whether this kind marks a logical communication boundary. These are
    /// the steps PCT-CP samples its priority-change points from.
    pub fn is_synchronization(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Join | Self::Yield | Self::Send | Self::Receive
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Start => f.write_str("start"),
            Self::Create => f.write_str("create"),
            Self::Join => f.write_str("join"),
            Self::Yield => f.write_str("yield"),
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
            Self::Acquire => f.write_str("acquire"),
            Self::Release => f.write_str("release"),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationScope
// ---------------------------------------------------------------------------

/// Whether the operation currently holds a monitor-style lock. The runtime
/// toggles this on critical-section entry and exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationScope {
    #[default]
    Default,
    Synchronized,
}

impl fmt::Display for OperationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Synchronized => f.write_str("synchronized"),
        }
    }
}

// ---------------------------------------------------------------------------
// AsyncOperation
// ---------------------------------------------------------------------------

/// A scheduler-visible unit of concurrent work.
///
/// `id` and `group_id` are fixed at creation. `parent` is the operation that
/// created or most recently resumed this one; the runtime may rewrite it only
/// together with clearing `continuation_handled`, which tells the strategy a
/// state-machine advance is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncOperation {
    pub id: OperationId,
    pub status: OperationStatus,
    pub kind: OperationKind,
    pub scope: OperationScope,
    pub parent: Option<OperationId>,
    /// Logical task this operation belongs to; `None` for plain threads
    /// and delays.
    pub group_id: Option<TaskGroupId>,
    pub is_continuation: bool,
    pub is_group_owner: bool,
    pub is_delay: bool,
    /// False while a state-machine advance awaits strategy handling. Written
    /// back to true by the strategy after group remigration.
    pub continuation_handled: bool,
}

impl AsyncOperation {
    /// The owner operation of a logical task group.
    pub fn task_owner(id: OperationId, group_id: TaskGroupId) -> Self {
        Self {
            id,
            status: OperationStatus::Enabled,
            kind: OperationKind::Start,
            scope: OperationScope::Default,
            parent: None,
            group_id: Some(group_id),
            is_continuation: false,
            is_group_owner: true,
            is_delay: false,
            continuation_handled: true,
        }
    }

    /// A short-lived continuation implementing part of an existing task.
    pub fn continuation(id: OperationId, parent: OperationId, group_id: TaskGroupId) -> Self {
        Self {
            id,
            status: OperationStatus::Enabled,
            kind: OperationKind::Start,
            scope: OperationScope::Default,
            parent: Some(parent),
            group_id: Some(group_id),
            is_continuation: true,
            is_group_owner: false,
            is_delay: false,
            continuation_handled: false,
        }
    }

    /// A plain thread outside any task group.
    pub fn thread(id: OperationId) -> Self {
        Self {
            id,
            status: OperationStatus::Enabled,
            kind: OperationKind::Start,
            scope: OperationScope::Default,
            parent: None,
            group_id: None,
            is_continuation: false,
            is_group_owner: false,
            is_delay: false,
            continuation_handled: true,
        }
    }

    /// A timed delay outside any task group.
    pub fn delay(id: OperationId) -> Self {
        Self {
            id,
            status: OperationStatus::Delayed,
            kind: OperationKind::Default,
            scope: OperationScope::Default,
            parent: None,
            group_id: None,
            is_continuation: false,
            is_group_owner: false,
            is_delay: true,
            continuation_handled: true,
        }
    }

    /// Whether this operation is eligible for scheduling right now.
    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
