//! BDD step definitions for the cloned virtual machine lifecycle.

use std::time::Duration;

use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use vmclone::test_support::ScriptedInventory;
use vmclone::{DiskMoveType, ReadOutcome, Resource, ResourceState, TaskAction, TaskInfo, TaskMethod};

use super::test_helpers::{
    LifecycleWorld, RECORDED_ID, StepOutcome, TEMPLATE_ID, parse_failure_kind,
    template_inventory,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a template with a current snapshot")]
fn template_with_snapshot() -> LifecycleWorld {
    LifecycleWorld::new(template_inventory().with_snapshot(TEMPLATE_ID, "snapshot-7"))
}

#[given("a template without snapshots")]
fn template_without_snapshot() -> LifecycleWorld {
    LifecycleWorld::new(template_inventory())
}

#[given("a template that cannot be found")]
fn missing_template() -> LifecycleWorld {
    LifecycleWorld::new(ScriptedInventory::new())
}

#[given("linked clones are requested")]
fn linked_clones_requested(lifecycle_world: &LifecycleWorld) -> LifecycleWorld {
    let mut world = lifecycle_world.clone();
    world.request.linked_clone = true;
    world
}

#[given("the clone task never finishes")]
fn clone_never_finishes(lifecycle_world: &LifecycleWorld) -> LifecycleWorld {
    lifecycle_world
        .inventory
        .push_task_info(TaskAction::CloneVm, TaskInfo::running());
    let mut world = lifecycle_world.clone();
    world.task_timeout = Duration::ZERO;
    world
}

#[given("a recorded virtual machine named \"{name}\"")]
fn recorded_vm(name: String) -> LifecycleWorld {
    let mut world = LifecycleWorld::new(ScriptedInventory::new().with_name(RECORDED_ID, &name));
    world.recorded = Some(ResourceState {
        id: String::from(RECORDED_ID),
        name,
    });
    world
}

#[given("the virtual machine was renamed to \"{name}\"")]
fn vm_renamed(lifecycle_world: &LifecycleWorld, name: String) {
    lifecycle_world.inventory.rename(RECORDED_ID, &name);
}

#[given("the virtual machine was deleted out of band")]
fn vm_deleted_out_of_band(lifecycle_world: &LifecycleWorld) {
    lifecycle_world.inventory.remove_vm(RECORDED_ID);
}

#[given("power-off completes with an error")]
fn power_off_fails(lifecycle_world: &LifecycleWorld) {
    lifecycle_world.inventory.push_task_info(
        TaskAction::PowerOff,
        TaskInfo::failed("The attempted operation cannot be performed in the current state"),
    );
}

#[given("destroy completes with an error")]
fn destroy_fails(lifecycle_world: &LifecycleWorld) {
    lifecycle_world
        .inventory
        .push_task_info(TaskAction::Destroy, TaskInfo::failed("virtual machine is locked"));
}

#[when("I create the virtual machine")]
fn create_vm(lifecycle_world: &LifecycleWorld) -> Result<LifecycleWorld, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Runtime(err.to_string()))?;
    let reconciler = lifecycle_world.reconciler();
    let request = lifecycle_world.request.clone();
    let result = runtime.block_on(async move { reconciler.create(&request).await });

    let mut world = lifecycle_world.clone();
    match result {
        Ok(state) => {
            world.recorded = Some(state);
            world.outcome = Some(StepOutcome::Created);
        }
        Err(err) => {
            world.outcome = Some(StepOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            });
        }
    }
    Ok(world)
}

#[when("I read the virtual machine")]
fn read_vm(lifecycle_world: &LifecycleWorld) -> Result<LifecycleWorld, StepError> {
    let recorded = recorded_state(lifecycle_world)?;
    let runtime = Runtime::new().map_err(|err| StepError::Runtime(err.to_string()))?;
    let reconciler = lifecycle_world.reconciler();
    let outcome = runtime
        .block_on(async move { reconciler.read(&recorded).await })
        .map_err(|err| StepError::Assertion(format!("read should never fail: {err}")))?;

    let mut world = lifecycle_world.clone();
    world.recorded = match &outcome {
        ReadOutcome::Present(state) => Some(state.clone()),
        ReadOutcome::Absent => None,
    };
    world.outcome = Some(StepOutcome::Read(outcome));
    Ok(world)
}

#[when("I delete the virtual machine")]
fn delete_vm(lifecycle_world: &LifecycleWorld) -> Result<LifecycleWorld, StepError> {
    let recorded = recorded_state(lifecycle_world)?;
    let runtime = Runtime::new().map_err(|err| StepError::Runtime(err.to_string()))?;
    let reconciler = lifecycle_world.reconciler();
    let result = runtime.block_on(async move { reconciler.delete(&recorded).await });

    let mut world = lifecycle_world.clone();
    match result {
        Ok(()) => {
            world.recorded = None;
            world.outcome = Some(StepOutcome::Deleted);
        }
        Err(err) => {
            world.outcome = Some(StepOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            });
        }
    }
    Ok(world)
}

#[then("the virtual machine is recorded")]
fn vm_recorded(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let state = recorded_state(lifecycle_world)?;
    if state.id.is_empty() {
        return Err(StepError::Assertion(String::from(
            "recorded identity should not be empty",
        )));
    }
    if lifecycle_world.inventory.has_vm(&state.id) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "recorded virtual machine {} should exist",
            state.id
        )))
    }
}

#[then("no virtual machine is recorded")]
fn nothing_recorded(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    match &lifecycle_world.recorded {
        None => Ok(()),
        Some(state) => Err(StepError::Assertion(format!(
            "expected no recorded identity, found {}",
            state.id
        ))),
    }
}

#[then("the recorded name is \"{name}\"")]
fn recorded_name(lifecycle_world: &LifecycleWorld, name: String) -> Result<(), StepError> {
    let state = recorded_state(lifecycle_world)?;
    if state.name == name {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected recorded name {name}, got {}",
            state.name
        )))
    }
}

#[then("the operation fails with \"{kind}\"")]
fn operation_fails(lifecycle_world: &LifecycleWorld, kind: String) -> Result<(), StepError> {
    let expected = parse_failure_kind(&kind)
        .ok_or_else(|| StepError::Assertion(format!("unknown failure kind: {kind}")))?;
    match &lifecycle_world.outcome {
        Some(StepOutcome::Failed { kind: actual, .. }) if *actual == expected => Ok(()),
        Some(StepOutcome::Failed {
            kind: actual,
            message,
        }) => Err(StepError::Assertion(format!(
            "expected failure kind {expected:?}, got {actual:?}: {message}"
        ))),
        other => Err(StepError::Assertion(format!(
            "expected failure outcome, got {other:?}"
        ))),
    }
}

#[then("no task was submitted")]
fn no_task_submitted(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let submitted = lifecycle_world.inventory.submitted();
    if submitted.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no submissions, got {submitted:?}"
        )))
    }
}

#[then("the clone was submitted exactly once")]
fn clone_submitted_once(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let submitted = lifecycle_world.inventory.submitted();
    if submitted == [TaskAction::CloneVm] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a single clone submission, got {submitted:?}"
        )))
    }
}

#[then("the clone uses child disk backing")]
fn clone_uses_child_disks(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let submissions = lifecycle_world.inventory.clone_submissions();
    match submissions.first() {
        Some(TaskMethod::CloneVm { spec, .. })
            if spec.location.disk_move_type == Some(DiskMoveType::CreateNewChildDiskBacking) =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected a linked clone submission, got {other:?}"
        ))),
    }
}

#[then("power-off was submitted before destroy")]
fn power_off_before_destroy(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let submitted = lifecycle_world.inventory.submitted();
    if submitted == [TaskAction::PowerOff, TaskAction::Destroy] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected power-off then destroy, got {submitted:?}"
        )))
    }
}

fn recorded_state(world: &LifecycleWorld) -> Result<ResourceState, StepError> {
    world
        .recorded
        .clone()
        .ok_or_else(|| StepError::Assertion(String::from("no recorded virtual machine")))
}
