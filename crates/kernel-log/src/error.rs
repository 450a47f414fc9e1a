// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel log processing.

use std::path::PathBuf;

/// Errors raised while classifying, parsing or persisting kernel logs.
#[derive(Debug, thiserror::Error)]
pub enum KernelLogError {
    /// A classifier pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A `/dev/kmsg` record did not follow `prefix,seq,ts,flags;message`.
    #[error("malformed kmsg record: {detail}")]
    MalformedRecord { detail: String },

    /// A log, state or report file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A report could not be serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KernelLogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            detail: detail.into(),
        }
    }
}
