//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// vSphere connection settings derived from environment variables,
/// configuration files, and defaults.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VSPHERE",
    discovery(
        app_name = "vmclone",
        env_var = "VMCLONE_CONFIG_PATH",
        config_file_name = "vmclone.toml",
        dotfile_name = ".vmclone.toml",
        project_file_name = "vmclone.toml"
    )
)]
pub struct VsphereConfig {
    /// Base URL of the vCenter server (for example `https://vcenter.local`).
    pub server: String,
    /// User name used to open a session.
    pub user: String,
    /// Password used to open a session.
    pub password: String,
    /// Accept self-signed or otherwise unverifiable TLS certificates.
    #[ortho_config(default = false)]
    pub allow_unverified_ssl: bool,
    /// Release segment of the JSON API path (`/sdk/vim25/<release>`).
    #[ortho_config(default = DEFAULT_API_RELEASE.to_owned())]
    pub api_release: String,
    /// Upper bound on how long a remote task may run before the operation
    /// gives up waiting.
    #[ortho_config(default = 3600)]
    pub task_timeout_secs: u64,
    /// Delay between task status polls.
    #[ortho_config(default = 1000)]
    pub poll_interval_ms: u64,
}

/// API release used when none is configured.
pub const DEFAULT_API_RELEASE: &str = "8.0.2.0";

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl VsphereConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to vmclone.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("vmclone")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Maximum time spent waiting for a single task.
    #[must_use]
    pub const fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Delay between task status polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidValue`] when a wait setting is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.server,
            &FieldMetadata::new("vCenter server URL", "VSPHERE_SERVER", "server"),
        )?;
        Self::require_field(
            &self.user,
            &FieldMetadata::new("vCenter user name", "VSPHERE_USER", "user"),
        )?;
        Self::require_field(
            &self.password,
            &FieldMetadata::new("vCenter password", "VSPHERE_PASSWORD", "password"),
        )?;
        Self::require_field(
            &self.api_release,
            &FieldMetadata::new("API release", "VSPHERE_API_RELEASE", "api_release"),
        )?;
        if self.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "task_timeout_secs must be greater than zero",
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "poll_interval_ms must be greater than zero",
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
