//! Clone creation.

use crate::inventory::{
    CloneSpec, DiskMoveType, Inventory, ManagedObjectRef, ObjectKind, RelocateSpec, TaskAction,
    TaskMethod,
};
use crate::resource::{CloneRequest, ResourceState};

use super::{CloneReconciler, LookupFailure, ReconcileError};

/// Builds the clone specification for `request` from the resolved snapshot
/// and pool.
#[must_use]
pub fn clone_spec(
    request: &CloneRequest,
    snapshot: ManagedObjectRef,
    pool: ManagedObjectRef,
) -> CloneSpec {
    CloneSpec {
        snapshot,
        location: RelocateSpec {
            pool,
            disk_move_type: request
                .linked_clone
                .then_some(DiskMoveType::CreateNewChildDiskBacking),
        },
        power_on: request.power_on,
        template: false,
    }
}

impl<I: Inventory + Sync> CloneReconciler<I> {
    pub(super) async fn clone_from_snapshot(
        &self,
        request: &CloneRequest,
    ) -> Result<ResourceState, ReconcileError<I::Error>> {
        request.validate()?;

        let source = self
            .resolve(ObjectKind::VirtualMachine, &request.source_path())
            .await?;
        let folder = self
            .resolve(ObjectKind::Folder, &request.folder_path())
            .await?;
        let pool = self
            .resolve(ObjectKind::ResourcePool, &request.pool_path())
            .await?;
        let snapshot = self.current_snapshot(&source).await?;

        let method = TaskMethod::CloneVm {
            folder,
            name: request.name.clone(),
            spec: clone_spec(request, snapshot, pool),
        };
        let task = self.start(&source, &method).await?;
        let info = self.wait_for_task(TaskAction::CloneVm, &task).await?;

        let created = info.result.ok_or_else(|| ReconcileError::MissingTaskResult {
            action: TaskAction::CloneVm,
            task: task.value.clone(),
        })?;
        tracing::info!(id = %created.value, name = %request.name, "virtual machine cloned");

        Ok(ResourceState {
            id: created.value,
            name: request.name.clone(),
        })
    }

    async fn resolve(
        &self,
        kind: ObjectKind,
        path: &str,
    ) -> Result<ManagedObjectRef, ReconcileError<I::Error>> {
        tracing::debug!(%kind, path, "resolving inventory path");
        let found = self
            .inventory
            .find_by_inventory_path(path)
            .await
            .map_err(|source| ReconcileError::LookupQuery {
                kind: kind.clone(),
                path: path.to_owned(),
                source,
            })?;

        match found {
            Some(object) if object.kind == kind => Ok(object),
            Some(object) => Err(ReconcileError::Lookup {
                kind,
                path: path.to_owned(),
                reason: LookupFailure::WrongType { found: object.kind },
            }),
            None => Err(ReconcileError::Lookup {
                kind,
                path: path.to_owned(),
                reason: LookupFailure::NotFound,
            }),
        }
    }

    async fn current_snapshot(
        &self,
        source: &ManagedObjectRef,
    ) -> Result<ManagedObjectRef, ReconcileError<I::Error>> {
        self.inventory
            .current_snapshot(source)
            .await
            .map_err(|err| ReconcileError::LookupQuery {
                kind: ObjectKind::Snapshot,
                path: source.value.clone(),
                source: err,
            })?
            .ok_or_else(|| ReconcileError::MissingSnapshot {
                source_vm: source.value.clone(),
            })
    }
}
