// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Appends classified messages to one JSON-lines file per severity.
//!
//! Each file rotates at 100 MB by default, keeping five old copies.

use crate::logfile::{RotatingFile, DEFAULT_KEEP_LOGS, DEFAULT_MAX_LOG_BYTES};
use crate::{KernelLogError, Severity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One line of a `<severity>.log` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339, local time.
    pub timestamp: String,
    pub message: String,
    pub criticality: Severity,
    pub context: serde_json::Value,
}

/// Writes [`LogEntry`] lines to `<dir>/<severity>.log`.
#[derive(Debug, Clone)]
pub struct SeverityRouter {
    dir: PathBuf,
    max_bytes: u64,
    keep: usize,
}

impl SeverityRouter {
    /// Creates the router, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, KernelLogError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| KernelLogError::io(&dir, e))?;
        Ok(Self {
            dir,
            max_bytes: DEFAULT_MAX_LOG_BYTES,
            keep: DEFAULT_KEEP_LOGS,
        })
    }

    /// Size limit per file and number of rotated files kept.
    pub fn with_rotation(mut self, max_bytes: u64, keep: usize) -> Self {
        self.max_bytes = max_bytes;
        self.keep = keep;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, severity: Severity) -> PathBuf {
        self.dir.join(format!("{severity}.log"))
    }

    /// Appends one entry. `context` is written as-is; pass
    /// `serde_json::Value::Null` for none.
    pub fn record(
        &self,
        severity: Severity,
        message: &str,
        context: serde_json::Value,
    ) -> Result<(), KernelLogError> {
        let context = match context {
            serde_json::Value::Null => serde_json::json!({}),
            other => other,
        };
        let entry = LogEntry {
            timestamp: chrono::Local::now().to_rfc3339(),
            message: message.to_string(),
            criticality: severity,
            context,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        RotatingFile::new(self.path_for(severity))
            .with_rotation(self.max_bytes, self.keep)
            .append(&line)
    }
}
