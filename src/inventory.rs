//! Abstraction over the remote virtualization inventory.
//!
//! The reconciler only needs path lookups, two properties, and task
//! submission with status polling. [`crate::vsphere::VsphereClient`] provides
//! the real implementation; [`crate::test_support::ScriptedInventory`] a
//! scripted one.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Type of a managed object on the platform.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ObjectKind {
    /// A virtual machine or template.
    VirtualMachine,
    /// A VM or host folder.
    Folder,
    /// A resource pool.
    ResourcePool,
    /// A virtual machine snapshot.
    Snapshot,
    /// An asynchronous task.
    Task,
    /// The inventory search index.
    SearchIndex,
    /// Any other managed object type, by its platform name.
    Other(String),
}

impl ObjectKind {
    /// Platform type name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::VirtualMachine => "VirtualMachine",
            Self::Folder => "Folder",
            Self::ResourcePool => "ResourcePool",
            Self::Snapshot => "VirtualMachineSnapshot",
            Self::Task => "Task",
            Self::SearchIndex => "SearchIndex",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl From<&str> for ObjectKind {
    fn from(value: &str) -> Self {
        match value {
            "VirtualMachine" => Self::VirtualMachine,
            "Folder" => Self::Folder,
            "ResourcePool" => Self::ResourcePool,
            "VirtualMachineSnapshot" => Self::Snapshot,
            "Task" => Self::Task,
            "SearchIndex" => Self::SearchIndex,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a managed object: its type plus platform identifier.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ManagedObjectRef {
    /// Managed object type.
    pub kind: ObjectKind,
    /// Platform identifier (for example `vm-42`).
    pub value: String,
}

impl ManagedObjectRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(kind: ObjectKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Reference to a virtual machine by identifier.
    #[must_use]
    pub fn virtual_machine(value: impl Into<String>) -> Self {
        Self::new(ObjectKind::VirtualMachine, value)
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// How disks are placed when cloning.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiskMoveType {
    /// Child disks backed by the parent's disks, copy-on-write.
    CreateNewChildDiskBacking,
}

impl DiskMoveType {
    /// Platform name of the disk move type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateNewChildDiskBacking => "createNewChildDiskBacking",
        }
    }
}

/// Placement of the new virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelocateSpec {
    /// Destination resource pool.
    pub pool: ManagedObjectRef,
    /// Disk placement; `None` requests a full copy.
    pub disk_move_type: Option<DiskMoveType>,
}

/// Everything the platform needs to clone a virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CloneSpec {
    /// Snapshot of the source the clone is based on.
    pub snapshot: ManagedObjectRef,
    /// Placement of the clone.
    pub location: RelocateSpec,
    /// Whether to power the clone on once created.
    pub power_on: bool,
    /// Whether the clone is marked as a template.
    pub template: bool,
}

/// Kind of task a [`TaskMethod`] starts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TaskAction {
    /// Clone a virtual machine.
    CloneVm,
    /// Power a virtual machine off.
    PowerOff,
    /// Destroy a managed entity.
    Destroy,
}

impl TaskAction {
    /// Platform method name of the action.
    #[must_use]
    pub const fn method_name(self) -> &'static str {
        match self {
            Self::CloneVm => "CloneVM_Task",
            Self::PowerOff => "PowerOffVM_Task",
            Self::Destroy => "Destroy_Task",
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// A task-returning method invoked against a managed object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskMethod {
    /// Clone the target virtual machine.
    CloneVm {
        /// Folder receiving the clone.
        folder: ManagedObjectRef,
        /// Display name of the clone.
        name: String,
        /// Clone specification.
        spec: CloneSpec,
    },
    /// Power the target virtual machine off.
    PowerOff,
    /// Destroy the target.
    Destroy,
}

impl TaskMethod {
    /// Action started by this method.
    #[must_use]
    pub const fn action(&self) -> TaskAction {
        match self {
            Self::CloneVm { .. } => TaskAction::CloneVm,
            Self::PowerOff => TaskAction::PowerOff,
            Self::Destroy => TaskAction::Destroy,
        }
    }
}

/// Execution state of a task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskState {
    /// Waiting to run.
    Queued,
    /// Running.
    Running,
    /// Completed successfully.
    Success,
    /// Completed with an error.
    Error,
}

/// Snapshot of a task's progress.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskInfo {
    /// Current state.
    pub state: TaskState,
    /// Object produced by the task, when it returns one.
    pub result: Option<ManagedObjectRef>,
    /// Error message reported by a failed task.
    pub error: Option<String>,
}

impl TaskInfo {
    /// Task still running.
    #[must_use]
    pub const fn running() -> Self {
        Self {
            state: TaskState::Running,
            result: None,
            error: None,
        }
    }

    /// Task completed successfully with an optional result.
    #[must_use]
    pub const fn success(result: Option<ManagedObjectRef>) -> Self {
        Self {
            state: TaskState::Success,
            result,
            error: None,
        }
    }

    /// Task completed with an error message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Future returned by inventory operations.
pub type InventoryFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Remote inventory operations used by the reconciler.
pub trait Inventory {
    /// Client specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolves an inventory path; `None` when nothing lives at the path.
    fn find_by_inventory_path<'a>(
        &'a self,
        path: &'a str,
    ) -> InventoryFuture<'a, Option<ManagedObjectRef>, Self::Error>;

    /// Returns the current snapshot of a virtual machine, if it has one.
    fn current_snapshot<'a>(
        &'a self,
        vm: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, Option<ManagedObjectRef>, Self::Error>;

    /// Returns the display name of an object.
    fn display_name<'a>(
        &'a self,
        object: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, String, Self::Error>;

    /// Starts a task against `target` and returns the task reference.
    fn submit<'a>(
        &'a self,
        target: &'a ManagedObjectRef,
        method: &'a TaskMethod,
    ) -> InventoryFuture<'a, ManagedObjectRef, Self::Error>;

    /// Returns the current progress of a task.
    fn task_info<'a>(
        &'a self,
        task: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, TaskInfo, Self::Error>;
}
