// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kernel-log
//!
//! Kernel log tooling for the board watchdog.
//!
//! - [`Classifier`]: ordered, case-insensitive regex sets that map a line
//!   to a [`Severity`].
//! - [`KmsgRecord`] / [`KmsgReader`]: the `/dev/kmsg` record format.
//! - [`LogAnalyzer`]: per-severity counts and failure lines of a whole log.
//! - [`SeverityRouter`]: JSON-line files, one per severity.
//! - [`RotatingFile`] / [`TextLog`]: size-rotated files and the plain
//!   `kernel.log` format.
//! - [`BootTracker`] / [`CrashReporter`]: boot-id based unclean-shutdown
//!   detection and JSON crash reports.
//!
//! Classification is pure; everything that touches the filesystem returns
//! a [`KernelLogError`].

mod analyzer;
mod classifier;
mod crash;
mod error;
mod kmsg;
mod logfile;
mod router;
mod severity;

pub use analyzer::{AnalysisReport, Finding, LogAnalyzer};
pub use classifier::{Classification, Classifier, ClassifierBuilder};
pub use crash::{
    read_boot_id, scan_crash_indicators, scan_failed_units, BootTracker, CrashIndicator,
    CrashReport, CrashReporter, IndicatorKind, SystemState, DEFAULT_MAX_REPORTS, KERNEL_LOG_TAIL,
};
pub use error::KernelLogError;
pub use kmsg::{KmsgReader, KmsgRecord};
pub use logfile::{RotatingFile, TextLog, DEFAULT_KEEP_LOGS, DEFAULT_MAX_LOG_BYTES};
pub use router::{LogEntry, SeverityRouter};
pub use severity::Severity;

/// Emits `message` as a `tracing` event at the level matching `severity`.
///
/// `tracing` has no level above `ERROR`, so `critical` is logged as an
/// error with a `critical = true` field.
pub fn emit(severity: Severity, message: &str) {
    match severity {
        Severity::Critical => tracing::error!(critical = true, "{message}"),
        Severity::Error => tracing::error!("{message}"),
        Severity::Warning => tracing::warn!("{message}"),
        Severity::Info => tracing::info!("{message}"),
        Severity::Debug => tracing::debug!("{message}"),
    }
}
