//! Core library for the vmclone resource provider.
//!
//! The crate manages one kind of infrastructure object: a vSphere virtual
//! machine cloned from the current snapshot of a template. It exposes the
//! host-facing [`Resource`] capability, the field schema used to decode user
//! configuration, an [`Inventory`] abstraction with a vSphere JSON API
//! implementation, and the reconciler tying them together
//! (create → wait for clone; read → refresh or report absent;
//! delete → power off, destroy).

pub mod config;
pub mod inventory;
pub mod reconciler;
pub mod resource;
pub mod schema;
pub mod state;
pub mod test_support;
pub mod vsphere;

pub use config::{ConfigError, VsphereConfig};
pub use inventory::{
    CloneSpec, DiskMoveType, Inventory, ManagedObjectRef, ObjectKind, RelocateSpec, TaskAction,
    TaskInfo, TaskMethod, TaskState,
};
pub use reconciler::{CloneReconciler, FailureKind, LookupFailure, ReconcileError};
pub use resource::{
    CloneRequest, CloneRequestBuilder, ReadOutcome, Resource, ResourceError, ResourceState,
};
pub use schema::{ResourceSchema, SchemaError, VIRTUAL_MACHINE};
pub use state::{DEFAULT_STATE_FILE, StateError, StateFile};
pub use vsphere::{VsphereClient, VsphereError};
