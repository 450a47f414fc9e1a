// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # metric-sampler
//!
//! Reads board metrics from `/proc/` and `/sys/` so that the watchdog can
//! decide whether the device is under sustained pressure.
//!
//! # Monitored Metrics
//! - **CPU utilisation**: busy percentage from `/proc/stat` deltas.
//! - **RAM utilisation**: `MemTotal - MemAvailable` from `/proc/meminfo`.
//! - **Link health**: `operstate` of a network interface (`1.0` = down).
//! - **SoC temperature**: thermal zone 0, in degrees Celsius.
//!
//! Outside the [`MetricSource`] set, [`PowerReader`] reads PMIC voltage
//! and current, and [`PowerHistory`] keeps a capped JSON log of them.
//!
//! Every metric is served through the [`MetricSource`] trait. The
//! production implementation is [`ProcSampler`]; tests inject a
//! [`ScriptedSource`] instead.
//!
//! # Unknown Values
//! A failed read is a [`SampleError`], never a number. Callers treat it as
//! "value unknown": it must not advance or reset any excursion timer.
//!
//! # Example
//! ```no_run
//! use metric_sampler::{Metric, MetricSource, ProcSampler};
//!
//! let mut sampler = ProcSampler::new();
//! match sampler.sample(Metric::RamPercent) {
//!     Ok(pct) => println!("RAM {pct:.1}%"),
//!     Err(e) => println!("RAM unknown: {e}"),
//! }
//! ```

mod cpu;
mod error;
mod link;
mod memory;
mod metric;
mod power;
mod proc_source;
mod scripted;
pub(crate) mod thermal;

pub use cpu::CpuTimes;
pub use error::SampleError;
pub use link::{find_wireless_interface, parse_default_gateway, GatewayCheck, LinkState};
pub use memory::MemoryInfo;
pub use metric::{Metric, Sample};
pub use power::{
    PowerHistory, PowerReader, PowerReading, DEFAULT_POWER_SUPPLY, POWER_HISTORY_LIMIT,
};
pub use proc_source::ProcSampler;
pub use scripted::ScriptedSource;

/// A pluggable reader for named board metrics.
///
/// Implementations must return quickly: a read either completes from a
/// procfs/sysfs file or fails fast with a [`SampleError`]. `&mut self`
/// lets stateful sources (CPU% needs the previous counters) keep history.
pub trait MetricSource {
    /// Reads the current value of `metric`.
    fn sample(&mut self, metric: Metric) -> Result<f64, SampleError>;
}

impl<S: MetricSource + ?Sized> MetricSource for Box<S> {
    fn sample(&mut self, metric: Metric) -> Result<f64, SampleError> {
        (**self).sample(metric)
    }
}
