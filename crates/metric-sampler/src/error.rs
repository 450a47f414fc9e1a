// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for metric sampling.

use crate::Metric;
use std::time::Duration;

/// Errors that can occur when sampling a metric.
///
/// Every variant means "value unknown" to the watchdog.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// A sysfs or procfs file is missing or unreadable.
    #[error("source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A system file was read but its content could not be parsed.
    #[error("failed to parse value from {path}: {detail}")]
    Parse { path: String, detail: String },

    /// The source has no way of producing this metric.
    #[error("metric '{metric}' is not supported by this source")]
    Unsupported { metric: Metric },

    /// The read did not complete within the sampling timeout.
    #[error("sampling '{metric}' took {elapsed:?} (limit {limit:?})")]
    Timeout {
        metric: Metric,
        elapsed: Duration,
        limit: Duration,
    },

    /// An earlier read of this metric has not returned yet.
    #[error("previous read of '{metric}' is still in progress")]
    Stalled { metric: Metric },

    /// The blocking read task panicked or was cancelled.
    #[error("read of '{metric}' aborted: {detail}")]
    ReadAborted { metric: Metric, detail: String },

    /// A history file could not be written.
    #[error("failed to persist {path}: {detail}")]
    Persist { path: String, detail: String },

    /// A metric name did not match any known [`Metric`].
    #[error("unknown metric '{name}'")]
    UnknownMetric { name: String },
}

impl SampleError {
    /// Builds a [`SampleError::SourceUnavailable`] from a path and an I/O error.
    pub fn unavailable(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }
}
