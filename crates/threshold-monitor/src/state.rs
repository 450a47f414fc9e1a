// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-metric excursion bookkeeping.

use std::time::{Duration, Instant};

/// Mutable excursion record owned by exactly one [`DebounceMonitor`].
///
/// Invariant: `sustained_since` is `None` iff the most recent *known*
/// sample was at or below `threshold`. Unknown samples leave it untouched.
///
/// [`DebounceMonitor`]: crate::DebounceMonitor
#[derive(Debug, Clone, PartialEq)]
pub struct ExcursionState {
    /// Value that must be strictly exceeded to count as an excursion.
    pub threshold: f64,
    /// Start of the current unbroken excursion, if any.
    pub sustained_since: Option<Instant>,
    /// Most recent known value; `NaN` until the first known sample.
    pub last_value: f64,
    /// Whether the corrective action already fired for this excursion.
    pub action_fired: bool,
}

impl ExcursionState {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            sustained_since: None,
            last_value: f64::NAN,
            action_fired: false,
        }
    }

    pub fn in_excursion(&self) -> bool {
        self.sustained_since.is_some()
    }

    /// Length of the current excursion at `now`, or `None` when normal.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.sustained_since
            .map(|since| now.saturating_duration_since(since))
    }

    /// Strict comparison: a value equal to the threshold is not an excursion.
    pub fn exceeds(&self, value: f64) -> bool {
        value > self.threshold
    }
}
