// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # threshold-monitor
//!
//! Debounced threshold watchdog for a single board metric.
//!
//! A [`DebounceMonitor`] consumes samples for one metric and tracks how
//! long the value has continuously exceeded its threshold. Once the
//! excursion has lasted `sustained_seconds`, it fires exactly one
//! [`ActionEvent`] for that excursion; the event is handed to a
//! [`CorrectiveAction`] (reboot, interface reset, or a recorder in tests).
//!
//! # State Machine
//! ```text
//!            value > threshold              value > threshold,
//!   Normal ─────────────────────▶ Excursion ─ elapsed >= sustained ─▶ fire once
//!     ▲                               │
//!     └──── value <= threshold ───────┘     (unknown value: hold)
//! ```
//!
//! # Polling
//! [`MonitorLoop`] drives one monitor from a [`MetricSource`] on a fixed
//! `tokio` interval, one loop per metric. Loops share nothing but the
//! stop signal. Reads and actions block, so they run on the blocking pool.
//!
//! [`MetricSource`]: metric_sampler::MetricSource

mod action;
mod config;
mod error;
mod monitor;
mod runner;
mod state;
mod status;
mod usb;

pub use action::{
    CorrectiveAction, InterfaceResetAction, LogOnlyAction, RebootAction, RecordingAction,
};
pub use config::{LinkSection, MetricSection, MonitorConfig, WatchdogConfig};
pub use error::{ActionError, MonitorError};
pub use monitor::{ActionEvent, DebounceMonitor, Transition};
pub use runner::{LoopReport, MonitorLoop};
pub use state::ExcursionState;
pub use status::{format_value, StatusThrottle};
pub use usb::{find_usb_devices, UsbDevice, UsbRebind, DEFAULT_USB_KEYWORDS};
