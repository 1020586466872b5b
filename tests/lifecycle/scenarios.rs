//! BDD scenarios for the cloned virtual machine lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleWorld, lifecycle_world};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Clone a virtual machine from the template snapshot"
)]
fn scenario_clone_from_snapshot(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse to clone from an unknown template"
)]
fn scenario_unknown_template(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse to clone a template without snapshots"
)]
fn scenario_template_without_snapshot(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Create a linked clone"
)]
fn scenario_linked_clone(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Give up on a clone that never finishes"
)]
fn scenario_clone_timeout(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Detect a renamed virtual machine"
)]
fn scenario_renamed_vm(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Forget a virtual machine deleted out of band"
)]
fn scenario_deleted_out_of_band(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Destroy even when power-off does not complete"
)]
fn scenario_power_off_failure(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Keep the record when destroy fails"
)]
fn scenario_destroy_failure(lifecycle_world: LifecycleWorld) {
    drop(lifecycle_world);
}
