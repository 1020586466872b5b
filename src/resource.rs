//! Host-facing resource abstraction for cloned virtual machines.
//!
//! A host runtime drives a [`Resource`] through create, read, and delete. The
//! request type is the typed form of the user's configuration and the state
//! type is what the host persists between calls.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for one cloned virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CloneRequest {
    /// Display name given to the new virtual machine.
    pub name: String,
    /// Template virtual machine, relative to the datacenter `vm` folder.
    pub source: String,
    /// Datacenter holding the template, folder, host, and pool.
    pub datacenter: String,
    /// Destination folder, relative to the datacenter `vm` folder.
    pub folder: String,
    /// Host or cluster owning the destination resource pool.
    pub host: String,
    /// Destination resource pool below the host's `Resources` pool.
    pub pool: String,
    /// Requests copy-on-write child disks instead of a full disk copy.
    pub linked_clone: bool,
    /// Powers the clone on once it has been created.
    pub power_on: bool,
}

impl CloneRequest {
    /// Starts a builder for a [`CloneRequest`].
    #[must_use]
    pub fn builder() -> CloneRequestBuilder {
        CloneRequestBuilder::new()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Validation`] when any string field is empty.
    pub fn validate(&self) -> Result<(), ResourceError> {
        let fields = [
            ("name", &self.name),
            ("source", &self.source),
            ("datacenter", &self.datacenter),
            ("folder", &self.folder),
            ("host", &self.host),
            ("pool", &self.pool),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(ResourceError::Validation(field.to_owned()));
            }
        }
        Ok(())
    }

    /// Inventory path of the template virtual machine.
    #[must_use]
    pub fn source_path(&self) -> String {
        format!("{}/vm/{}", self.datacenter, self.source)
    }

    /// Inventory path of the destination folder.
    #[must_use]
    pub fn folder_path(&self) -> String {
        format!("{}/vm/{}", self.datacenter, self.folder)
    }

    /// Inventory path of the destination resource pool.
    #[must_use]
    pub fn pool_path(&self) -> String {
        format!(
            "{}/host/{}/Resources/{}",
            self.datacenter, self.host, self.pool
        )
    }
}

/// Builder for [`CloneRequest`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CloneRequestBuilder {
    name: String,
    source: String,
    datacenter: String,
    folder: String,
    host: String,
    pool: String,
    linked_clone: bool,
    power_on: bool,
}

impl Default for CloneRequestBuilder {
    fn default() -> Self {
        Self {
            name: String::new(),
            source: String::new(),
            datacenter: String::new(),
            folder: String::new(),
            host: String::new(),
            pool: String::new(),
            linked_clone: false,
            power_on: true,
        }
    }
}

impl CloneRequestBuilder {
    /// Creates a builder with `linked_clone = false` and `power_on = true`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display name of the clone.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the template virtual machine.
    #[must_use]
    pub fn source(mut self, value: impl Into<String>) -> Self {
        self.source = value.into();
        self
    }

    /// Sets the datacenter.
    #[must_use]
    pub fn datacenter(mut self, value: impl Into<String>) -> Self {
        self.datacenter = value.into();
        self
    }

    /// Sets the destination folder.
    #[must_use]
    pub fn folder(mut self, value: impl Into<String>) -> Self {
        self.folder = value.into();
        self
    }

    /// Sets the host or cluster.
    #[must_use]
    pub fn host(mut self, value: impl Into<String>) -> Self {
        self.host = value.into();
        self
    }

    /// Sets the resource pool.
    #[must_use]
    pub fn pool(mut self, value: impl Into<String>) -> Self {
        self.pool = value.into();
        self
    }

    /// Sets whether the clone uses child disk backings.
    #[must_use]
    pub const fn linked_clone(mut self, value: bool) -> Self {
        self.linked_clone = value;
        self
    }

    /// Sets whether the clone is powered on after creation.
    #[must_use]
    pub const fn power_on(mut self, value: bool) -> Self {
        self.power_on = value;
        self
    }

    /// Builds and validates the [`CloneRequest`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Validation`] when any required field is empty.
    pub fn build(self) -> Result<CloneRequest, ResourceError> {
        let request = CloneRequest {
            name: self.name.trim().to_owned(),
            source: self.source.trim().to_owned(),
            datacenter: self.datacenter.trim().to_owned(),
            folder: self.folder.trim().to_owned(),
            host: self.host.trim().to_owned(),
            pool: self.pool.trim().to_owned(),
            linked_clone: self.linked_clone,
            power_on: self.power_on,
        };
        request.validate()?;
        Ok(request)
    }
}

/// State persisted by the host for a managed virtual machine.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResourceState {
    /// Platform-assigned managed object identifier (for example `vm-42`).
    pub id: String,
    /// Display name last observed on the platform.
    pub name: String,
}

/// Result of refreshing a managed virtual machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// The instance still exists; carries the refreshed state.
    Present(ResourceState),
    /// The instance no longer exists and the host should forget it.
    Absent,
}

/// Errors raised while building resource requests.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ResourceError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Future returned by resource operations.
pub type ResourceFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Capability interface a host runtime uses to manage one resource type.
pub trait Resource {
    /// Resource specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates the resource and returns the state the host must persist.
    fn create<'a>(
        &'a self,
        request: &'a CloneRequest,
    ) -> ResourceFuture<'a, ResourceState, Self::Error>;

    /// Refreshes persisted state from the platform.
    fn read<'a>(&'a self, state: &'a ResourceState)
    -> ResourceFuture<'a, ReadOutcome, Self::Error>;

    /// Removes the resource from the platform.
    fn delete<'a>(&'a self, state: &'a ResourceState) -> ResourceFuture<'a, (), Self::Error>;
}
