// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the credential rotator.
//!
//! Every [`RotatorError`] aborts the run. Per-profile rejections (bad
//! identity, disallowed account, young key, several remote keys) are not
//! errors; they are reported as [`SkipReason`](crate::planner::SkipReason)
//! values and the run continues with the remaining profiles.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`RotatorError`].
pub type Result<T> = std::result::Result<T, RotatorError>;

/// Step of the create/delete sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStage {
    /// Issuing the replacement key.
    Create,
    /// Removing the previous key after the replacement was issued.
    Delete,
}

impl std::fmt::Display for RotationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Errors that abort a rotation run.
#[derive(Debug, Error)]
pub enum RotatorError {
    /// File open/create/copy/rename failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid settings file or command-line configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The credential service answered with an error document.
    #[error("{operation} failed ({code}): {message}")]
    Remote {
        /// Remote action name (e.g. `ListAccessKeys`).
        operation: String,
        /// Service error code, or `Unavailable` when the call never got one.
        code: String,
        /// Service error message.
        message: String,
    },

    /// The credential service answered with something we could not decode.
    #[error("Invalid response from {operation}: {message}")]
    InvalidResponse {
        /// Remote action name.
        operation: String,
        /// What was wrong with the response.
        message: String,
    },

    /// Session could not be established for a profile.
    #[error("Cannot open session for profile '{profile}': {message}")]
    Session {
        /// Profile name.
        profile: String,
        /// Reason.
        message: String,
    },

    /// A create or delete call failed mid-rotation.
    ///
    /// After a delete failure the remote side holds two keys while the files
    /// still reference the old one. Rotations finished earlier in the same
    /// run are listed in `completed` and are still written to the files.
    #[error(
        "Rotation of profile '{profile}' failed at {stage} step: {message}{}",
        completed_note(.completed)
    )]
    RotationFailed {
        /// Profile that triggered the rotation.
        profile: String,
        /// Failing step.
        stage: RotationStage,
        /// Details, including any key id already issued.
        message: String,
        /// Profiles that already received a new key in this run.
        completed: Vec<String>,
    },
}

impl RotatorError {
    /// Create an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a remote service error.
    pub fn remote(
        operation: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Remote {
            operation: operation.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a session error.
    pub fn session(profile: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Session {
            profile: profile.into(),
            message: message.into(),
        }
    }

    /// Create a rotation failure.
    pub fn rotation_failed(
        profile: impl Into<String>,
        stage: RotationStage,
        message: impl Into<String>,
        completed: Vec<String>,
    ) -> Self {
        Self::RotationFailed {
            profile: profile.into(),
            stage,
            message: message.into(),
            completed,
        }
    }

    /// Profiles rotated earlier in a run that then failed.
    pub fn completed_rotations(&self) -> &[String] {
        match self {
            Self::RotationFailed { completed, .. } => completed,
            _ => &[],
        }
    }

    /// Returns true if this error left remote state partially rotated.
    pub fn is_partial_rotation(&self) -> bool {
        matches!(self, Self::RotationFailed { .. })
    }
}

fn completed_note(completed: &[String]) -> String {
    if completed.is_empty() {
        String::new()
    } else {
        format!(" (new keys already issued for: {})", completed.join(", "))
    }
}
