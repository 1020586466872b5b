//! Lifecycle of a virtual machine cloned from a template snapshot.
//!
//! [`CloneReconciler`] implements [`Resource`] on top of any [`Inventory`].
//! Every step fails fast: the first inventory error aborts the operation and
//! is returned with the step that produced it. The one exception is the
//! power-off wait during delete, which is logged and skipped.

mod create;
mod delete;
mod read;
mod wait;

use std::time::Duration;

use thiserror::Error;

use crate::config::VsphereConfig;
use crate::inventory::{Inventory, ObjectKind, TaskAction};
use crate::resource::{
    CloneRequest, ReadOutcome, Resource, ResourceError, ResourceFuture, ResourceState,
};

pub use create::clone_spec;

/// Task wait bound used when none is configured.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(3600);
/// Task poll delay used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Why an inventory path did not yield a usable object.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LookupFailure {
    /// Nothing lives at the path.
    #[error("not found")]
    NotFound,
    /// Something lives at the path but has the wrong type.
    #[error("found a {found} instead")]
    WrongType {
        /// Type of the object actually found.
        found: ObjectKind,
    },
}

/// Coarse classification of reconcile failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// The configuration was rejected before any remote call.
    Validation,
    /// An inventory object could not be resolved.
    Lookup,
    /// A remote precondition was not met.
    Precondition,
    /// The platform refused to start a task.
    TaskSubmission,
    /// A started task failed or could not be observed to completion.
    TaskExecution,
}

/// Errors raised by [`CloneReconciler`].
#[derive(Debug, Error)]
pub enum ReconcileError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the request fails validation.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ResourceError),
    /// Raised when an inventory path is missing or holds the wrong type.
    #[error("error reading {kind} at {path}: {reason}")]
    Lookup {
        /// Expected object type.
        kind: ObjectKind,
        /// Inventory path or identifier being resolved.
        path: String,
        /// Why the lookup failed.
        reason: LookupFailure,
    },
    /// Raised when the inventory call behind a lookup fails.
    #[error("error reading {kind} at {path}: {source}")]
    LookupQuery {
        /// Expected object type.
        kind: ObjectKind,
        /// Inventory path or identifier being resolved.
        path: String,
        /// Inventory error.
        #[source]
        source: E,
    },
    /// Raised when the template has no snapshot to clone from.
    #[error("base VM {source_vm} has no snapshots")]
    MissingSnapshot {
        /// Identifier of the template virtual machine.
        source_vm: String,
    },
    /// Raised when the platform rejects a task.
    #[error("error starting {action} on {target}: {source}")]
    TaskSubmission {
        /// Task being started.
        action: TaskAction,
        /// Identifier of the object the task targets.
        target: String,
        /// Inventory error.
        #[source]
        source: E,
    },
    /// Raised when a task completes with an error.
    #[error("{action} task {task} failed: {message}")]
    TaskFailed {
        /// Task that failed.
        action: TaskAction,
        /// Task identifier.
        task: String,
        /// Error reported by the task.
        message: String,
    },
    /// Raised when task progress cannot be read.
    #[error("error waiting for {action} task {task}: {source}")]
    TaskPoll {
        /// Task being observed.
        action: TaskAction,
        /// Task identifier.
        task: String,
        /// Inventory error.
        #[source]
        source: E,
    },
    /// Raised when a task is still running once the wait bound elapses.
    #[error("timed out after {timeout:?} waiting for {action} task {task}")]
    TaskTimeout {
        /// Task being observed.
        action: TaskAction,
        /// Task identifier.
        task: String,
        /// Wait bound that elapsed.
        timeout: Duration,
    },
    /// Raised when a task that must produce an object returns nothing.
    #[error("{action} task {task} completed without a result")]
    MissingTaskResult {
        /// Task that completed.
        action: TaskAction,
        /// Task identifier.
        task: String,
    },
}

impl<E> ReconcileError<E>
where
    E: std::error::Error + 'static,
{
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::Lookup { .. } | Self::LookupQuery { .. } => FailureKind::Lookup,
            Self::MissingSnapshot { .. } => FailureKind::Precondition,
            Self::TaskSubmission { .. } => FailureKind::TaskSubmission,
            Self::TaskFailed { .. }
            | Self::TaskPoll { .. }
            | Self::TaskTimeout { .. }
            | Self::MissingTaskResult { .. } => FailureKind::TaskExecution,
        }
    }
}

/// Manages cloned virtual machines through an [`Inventory`].
#[derive(Clone, Debug)]
pub struct CloneReconciler<I> {
    inventory: I,
    task_timeout: Duration,
    poll_interval: Duration,
}

impl<I: Inventory> CloneReconciler<I> {
    /// Creates a reconciler with the default wait settings.
    #[must_use]
    pub const fn new(inventory: I) -> Self {
        Self {
            inventory,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Creates a reconciler using the wait settings from `config`.
    #[must_use]
    pub const fn from_config(inventory: I, config: &VsphereConfig) -> Self {
        Self::new(inventory)
            .with_task_timeout(config.task_timeout())
            .with_poll_interval(config.poll_interval())
    }

    /// Overrides how long a single task may run.
    #[must_use]
    pub const fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Overrides the delay between task polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the underlying inventory.
    #[must_use]
    pub const fn inventory(&self) -> &I {
        &self.inventory
    }
}

impl<I> Resource for CloneReconciler<I>
where
    I: Inventory + Sync,
{
    type Error = ReconcileError<I::Error>;

    fn create<'a>(
        &'a self,
        request: &'a CloneRequest,
    ) -> ResourceFuture<'a, ResourceState, Self::Error> {
        Box::pin(async move { self.clone_from_snapshot(request).await })
    }

    fn read<'a>(
        &'a self,
        state: &'a ResourceState,
    ) -> ResourceFuture<'a, ReadOutcome, Self::Error> {
        Box::pin(async move { Ok(self.refresh(state).await) })
    }

    fn delete<'a>(&'a self, state: &'a ResourceState) -> ResourceFuture<'a, (), Self::Error> {
        Box::pin(async move { self.power_off_and_destroy(state).await })
    }
}
