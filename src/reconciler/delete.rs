//! Power-off and destroy.

use crate::inventory::{Inventory, ManagedObjectRef, TaskAction, TaskMethod};
use crate::resource::ResourceState;

use super::{CloneReconciler, ReconcileError};

impl<I: Inventory + Sync> CloneReconciler<I> {
    pub(super) async fn power_off_and_destroy(
        &self,
        state: &ResourceState,
    ) -> Result<(), ReconcileError<I::Error>> {
        let vm = ManagedObjectRef::virtual_machine(state.id.as_str());

        // The platform refuses to destroy a running machine. A power-off that
        // fails to complete usually means it was already off.
        let power_off = self.start(&vm, &TaskMethod::PowerOff).await?;
        if let Err(err) = self.wait_for_task(TaskAction::PowerOff, &power_off).await {
            tracing::warn!(id = %state.id, error = %err, "power-off did not complete; destroying anyway");
        }

        let destroy = self.start(&vm, &TaskMethod::Destroy).await?;
        self.wait_for_task(TaskAction::Destroy, &destroy).await?;
        tracing::info!(id = %state.id, "virtual machine destroyed");
        Ok(())
    }
}
