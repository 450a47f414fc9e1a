// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the threshold watchdog.

/// Errors raised while building or configuring a monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A threshold or duration is out of range. Monitoring refuses to start.
    #[error("invalid configuration: {field} {detail}")]
    ConfigurationInvalid { field: &'static str, detail: String },

    /// The configuration file could not be read, parsed, or serialised.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A corrective action could not be carried out.
///
/// Logged by the caller and never retried: the action is expected to end
/// the process anyway.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The external command could not be launched.
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The external command ran but reported failure.
    #[error("'{command}' exited with {status}")]
    CommandFailed { command: String, status: String },

    /// A sysfs control file could not be resolved or written.
    #[error("sysfs write to {path} failed: {source}")]
    Sysfs {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure, reported by the action itself.
    #[error("corrective action '{action}' failed: {detail}")]
    Failed { action: String, detail: String },
}
