//! Shared fixtures for lifecycle BDD scenarios.

use std::time::Duration;

use rstest::fixture;
use vmclone::test_support::ScriptedInventory;
use vmclone::{
    CloneReconciler, CloneRequest, FailureKind, ObjectKind, ReadOutcome, ResourceState,
};

pub const TEMPLATE_ID: &str = "vm-100";
pub const RECORDED_ID: &str = "vm-42";

#[derive(Clone, Debug)]
pub struct LifecycleWorld {
    pub inventory: ScriptedInventory,
    pub request: CloneRequest,
    pub task_timeout: Duration,
    pub recorded: Option<ResourceState>,
    pub outcome: Option<StepOutcome>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    Created,
    Read(ReadOutcome),
    Deleted,
    Failed { kind: FailureKind, message: String },
}

impl LifecycleWorld {
    pub fn new(inventory: ScriptedInventory) -> Self {
        Self {
            inventory,
            request: clone_request(),
            task_timeout: Duration::from_secs(60),
            recorded: None,
            outcome: None,
        }
    }

    pub fn reconciler(&self) -> CloneReconciler<ScriptedInventory> {
        CloneReconciler::new(self.inventory.clone())
            .with_task_timeout(self.task_timeout)
            .with_poll_interval(Duration::ZERO)
    }
}

#[fixture]
pub fn lifecycle_world() -> LifecycleWorld {
    LifecycleWorld::new(template_inventory().with_snapshot(TEMPLATE_ID, "snapshot-7"))
}

pub fn template_inventory() -> ScriptedInventory {
    ScriptedInventory::new()
        .with_object("dc1/vm/templates/base", ObjectKind::VirtualMachine, TEMPLATE_ID)
        .with_object("dc1/vm/apps", ObjectKind::Folder, "group-v3")
        .with_object(
            "dc1/host/cluster1/Resources/pool1",
            ObjectKind::ResourcePool,
            "resgroup-8",
        )
}

pub fn clone_request() -> CloneRequest {
    CloneRequest::builder()
        .name("web-01")
        .source("templates/base")
        .datacenter("dc1")
        .folder("apps")
        .host("cluster1")
        .pool("pool1")
        .build()
        .unwrap_or_else(|err| panic!("clone request fixture should be valid: {err}"))
}

pub fn parse_failure_kind(kind: &str) -> Option<FailureKind> {
    match kind {
        "validation" => Some(FailureKind::Validation),
        "lookup" => Some(FailureKind::Lookup),
        "precondition" => Some(FailureKind::Precondition),
        "task-submission" => Some(FailureKind::TaskSubmission),
        "task-execution" => Some(FailureKind::TaskExecution),
        _ => None,
    }
}
