// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A [`MetricSource`] that replays scripted readings.
//!
//! Used by the watchdog's unit and integration tests to drive it through
//! exact sequences of values and failures without touching the host.

use crate::{Metric, MetricSource, SampleError};
use std::collections::{HashMap, VecDeque};
use std::io;

/// Replays a queue of readings per metric, in order.
///
/// Once a metric's queue is exhausted, every further read fails with
/// [`SampleError::SourceUnavailable`].
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: HashMap<Metric, VecDeque<Result<f64, SampleError>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a sequence of successful readings for `metric`.
    pub fn with_values(mut self, metric: Metric, values: impl IntoIterator<Item = f64>) -> Self {
        self.push_values(metric, values);
        self
    }

    /// Appends successful readings for `metric`.
    pub fn push_values(&mut self, metric: Metric, values: impl IntoIterator<Item = f64>) {
        self.queue(metric).extend(values.into_iter().map(Ok));
    }

    /// Appends one failed ("value unknown") reading for `metric`.
    pub fn push_unavailable(&mut self, metric: Metric) {
        let err = SampleError::unavailable(
            format!("scripted:{metric}"),
            io::Error::new(io::ErrorKind::Other, "scripted read failure"),
        );
        self.queue(metric).push_back(Err(err));
    }

    /// Number of readings still queued for `metric`.
    pub fn remaining(&self, metric: Metric) -> usize {
        self.scripts.get(&metric).map_or(0, VecDeque::len)
    }

    fn queue(&mut self, metric: Metric) -> &mut VecDeque<Result<f64, SampleError>> {
        self.scripts.entry(metric).or_default()
    }
}

impl MetricSource for ScriptedSource {
    fn sample(&mut self, metric: Metric) -> Result<f64, SampleError> {
        self.scripts
            .get_mut(&metric)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(SampleError::unavailable(
                    format!("scripted:{metric}"),
                    io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"),
                ))
            })
    }
}
