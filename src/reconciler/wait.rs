//! Task submission and bounded completion waits.

use std::time::Instant;

use tokio::time::sleep;

use crate::inventory::{Inventory, ManagedObjectRef, TaskAction, TaskInfo, TaskMethod, TaskState};

use super::{CloneReconciler, ReconcileError};

impl<I: Inventory + Sync> CloneReconciler<I> {
    pub(super) async fn start(
        &self,
        target: &ManagedObjectRef,
        method: &TaskMethod,
    ) -> Result<ManagedObjectRef, ReconcileError<I::Error>> {
        let action = method.action();
        let task = self
            .inventory
            .submit(target, method)
            .await
            .map_err(|source| ReconcileError::TaskSubmission {
                action,
                target: target.value.clone(),
                source,
            })?;
        tracing::debug!(%action, %target, task = %task.value, "task submitted");
        Ok(task)
    }

    /// Polls `task` until it finishes. The task is always polled at least
    /// once, even with a zero timeout. A timeout too large to represent as
    /// an instant waits without a deadline.
    pub(super) async fn wait_for_task(
        &self,
        action: TaskAction,
        task: &ManagedObjectRef,
    ) -> Result<TaskInfo, ReconcileError<I::Error>> {
        let deadline = Instant::now().checked_add(self.task_timeout);
        loop {
            let info = self
                .inventory
                .task_info(task)
                .await
                .map_err(|source| ReconcileError::TaskPoll {
                    action,
                    task: task.value.clone(),
                    source,
                })?;

            match info.state {
                TaskState::Success => return Ok(info),
                TaskState::Error => {
                    return Err(ReconcileError::TaskFailed {
                        action,
                        task: task.value.clone(),
                        message: info
                            .error
                            .unwrap_or_else(|| String::from("task reported no error message")),
                    });
                }
                TaskState::Queued | TaskState::Running => {}
            }

            if deadline.is_some_and(|limit| Instant::now() >= limit) {
                return Err(ReconcileError::TaskTimeout {
                    action,
                    task: task.value.clone(),
                    timeout: self.task_timeout,
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}
