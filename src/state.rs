//! Persisted resource state between CLI invocations.
//!
//! The state file holds the JSON form of one [`ResourceState`]. A missing or
//! empty file means no virtual machine is under management.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::resource::ResourceState;

/// Default state file name, resolved against the working directory.
pub const DEFAULT_STATE_FILE: &str = "vmclone.state.json";

/// Errors raised while reading or writing the state file.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum StateError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the state file does not hold valid state.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// JSON state file at a fixed path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StateFile {
    path: Utf8PathBuf,
}

impl StateFile {
    /// Creates a handle for the state file at `path`. Nothing is read until
    /// [`StateFile::load`] is called.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the state file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Loads the persisted state, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<Option<ResourceState>, StateError> {
        let Some(dir) = self.open_parent()? else {
            return Ok(None);
        };
        let file_name = self.file_name()?;
        let contents = match dir.read_to_string(file_name) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(&err)),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| StateError::Parse {
                path: self.path.clone(),
                message: err.to_string(),
            })
    }

    /// Writes `state`, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] when the file cannot be written.
    pub fn save(&self, state: &ResourceState) -> Result<(), StateError> {
        let parent = self.parent();
        Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| {
            StateError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
            StateError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            }
        })?;

        let mut rendered = serde_json::to_string_pretty(state).map_err(|err| StateError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        rendered.push('\n');

        dir.write(self.file_name()?, rendered)
            .map_err(|err| self.io_error(&err))
    }

    /// Removes the state file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] when the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), StateError> {
        let Some(dir) = self.open_parent()? else {
            return Ok(());
        };
        match dir.remove_file(self.file_name()?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(&err)),
        }
    }

    fn parent(&self) -> &Utf8Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    fn file_name(&self) -> Result<&str, StateError> {
        self.path.file_name().ok_or_else(|| StateError::Io {
            path: self.path.clone(),
            message: String::from("state file path is missing a filename"),
        })
    }

    fn open_parent(&self) -> Result<Option<Dir>, StateError> {
        let parent = self.parent();
        match Dir::open_ambient_dir(parent, ambient_authority()) {
            Ok(dir) => Ok(Some(dir)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StateError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    fn io_error(&self, err: &io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}
