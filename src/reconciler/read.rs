//! Drift detection.

use crate::inventory::{Inventory, ManagedObjectRef};
use crate::resource::{ReadOutcome, ResourceState};

use super::CloneReconciler;

impl<I: Inventory + Sync> CloneReconciler<I> {
    /// Re-resolves the virtual machine by identifier. A failed lookup means
    /// the machine is gone, not that the read failed.
    pub(super) async fn refresh(&self, state: &ResourceState) -> ReadOutcome {
        let vm = ManagedObjectRef::virtual_machine(state.id.as_str());
        match self.inventory.display_name(&vm).await {
            Ok(name) => {
                if name != state.name {
                    tracing::info!(id = %state.id, old = %state.name, new = %name, "virtual machine renamed");
                }
                ReadOutcome::Present(ResourceState {
                    id: state.id.clone(),
                    name,
                })
            }
            Err(err) => {
                tracing::warn!(id = %state.id, error = %err, "virtual machine lookup failed; treating it as absent");
                ReadOutcome::Absent
            }
        }
    }
}
