// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The debounce state machine.
//!
//! ```text
//! Normal ──(value > threshold)──▶ Excursion  [warn once]
//! Excursion ──(value > threshold, elapsed >= sustained, not fired)──▶ Excursion + ActionEvent  [error]
//! Excursion ──(value <= threshold)──▶ Normal  [info, clears fired flag]
//! any ──(value unknown)──▶ unchanged
//! ```
//!
//! The monitor never reads a clock: every decision uses the sample's own
//! timestamp, so elapsed time is wall-clock based and independent of how
//! many ticks happened in between.

use crate::status::format_value;
use crate::{ExcursionState, MonitorConfig, MonitorError};
use metric_sampler::{Metric, Sample, SampleError};
use std::time::{Duration, Instant};

/// Emitted at most once per unbroken excursion.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    /// Name of the metric that stayed above its threshold.
    pub metric_name: String,
    /// How long the excursion had lasted when the action fired.
    pub duration_exceeded: Duration,
    /// Timestamp of the sample that fired the action.
    pub triggered_at: Instant,
    /// The value of that sample.
    pub value: f64,
    /// The threshold it exceeded.
    pub threshold: f64,
}

impl ActionEvent {
    /// Human-readable reason passed to the corrective action.
    pub fn reason(&self) -> String {
        format!(
            "{} exceeded {} for {:.1} seconds (last value {:.1})",
            self.metric_name,
            self.threshold,
            self.duration_exceeded.as_secs_f64(),
            self.value,
        )
    }
}

/// Outcome of feeding one observation to the monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// At or below threshold, and already normal.
    Normal,
    /// Normal → Excursion.
    Entered,
    /// Still above threshold, not yet for long enough.
    Sustained { elapsed: Duration },
    /// The corrective action fires now.
    Fired(ActionEvent),
    /// Still above threshold; the action already fired for this excursion.
    AlreadyFired { elapsed: Duration },
    /// Excursion → Normal.
    Recovered { after: Duration },
    /// Value unknown; state unchanged.
    Held,
}

/// Debounced threshold monitor for one metric.
#[derive(Debug)]
pub struct DebounceMonitor {
    metric: Metric,
    config: MonitorConfig,
    sustained: Duration,
    state: ExcursionState,
}

impl DebounceMonitor {
    /// Creates a monitor, rejecting out-of-range configuration.
    pub fn new(metric: Metric, config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        let sustained = config.sustained()?;
        Ok(Self {
            metric,
            state: ExcursionState::new(config.threshold_percent),
            config,
            sustained,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> &ExcursionState {
        &self.state
    }

    /// Feeds a known sample through the state machine.
    pub fn observe(&mut self, sample: &Sample) -> Transition {
        if sample.metric_name != self.metric.name() {
            tracing::warn!(
                expected = self.metric.name(),
                got = %sample.metric_name,
                "ignoring sample for another metric"
            );
            return Transition::Held;
        }
        if sample.value.is_nan() {
            tracing::warn!(metric = %self.metric, "NaN sample treated as unknown");
            return Transition::Held;
        }

        let now = sample.timestamp;
        let value = sample.value;
        self.state.last_value = value;

        if !self.state.exceeds(value) {
            self.state.action_fired = false;
            return match self.state.sustained_since.take() {
                Some(since) => {
                    let after = now.saturating_duration_since(since);
                    tracing::info!(
                        metric = %self.metric,
                        "{} returned to normal: {} after {:.1}s",
                        self.metric.label(),
                        format_value(self.metric, value),
                        after.as_secs_f64(),
                    );
                    Transition::Recovered { after }
                }
                None => Transition::Normal,
            };
        }

        let since = match self.state.sustained_since {
            Some(since) => since,
            None => {
                self.state.sustained_since = Some(now);
                tracing::warn!(
                    metric = %self.metric,
                    "{} exceeded {}: {}",
                    self.metric.label(),
                    self.state.threshold,
                    format_value(self.metric, value),
                );
                if !self.sustained.is_zero() {
                    return Transition::Entered;
                }
                now
            }
        };

        let elapsed = now.saturating_duration_since(since);
        if self.state.action_fired {
            return Transition::AlreadyFired { elapsed };
        }
        if elapsed < self.sustained {
            return Transition::Sustained { elapsed };
        }

        self.state.action_fired = true;
        let event = ActionEvent {
            metric_name: self.metric.name().to_string(),
            duration_exceeded: elapsed,
            triggered_at: now,
            value,
            threshold: self.state.threshold,
        };
        tracing::error!(
            metric = %self.metric,
            "{} exceeded {} for {:.1} seconds, firing corrective action",
            self.metric.label(),
            self.state.threshold,
            elapsed.as_secs_f64(),
        );
        Transition::Fired(event)
    }

    /// Records that the metric could not be read. Holds the current state.
    pub fn observe_unavailable(&mut self, err: &SampleError) -> Transition {
        tracing::warn!(
            metric = %self.metric,
            in_excursion = self.state.in_excursion(),
            "sample unavailable, holding state: {err}"
        );
        Transition::Held
    }

    /// One-line status fragment, e.g. `CPU: 85.0% (high for 3.0s)`.
    pub fn status_line(&self, now: Instant) -> String {
        let mut line = format!(
            "{}: {}",
            self.metric.label(),
            format_value(self.metric, self.state.last_value)
        );
        if let Some(elapsed) = self.state.elapsed(now) {
            let word = match self.metric {
                Metric::LinkDown => "down",
                _ => "high",
            };
            line.push_str(&format!(" ({word} for {:.1}s)", elapsed.as_secs_f64()));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn monitor(threshold: f64, sustained: f64) -> DebounceMonitor {
        DebounceMonitor::new(
            Metric::CpuPercent,
            MonitorConfig {
                threshold_percent: threshold,
                sustained_seconds: sustained,
                poll_interval_seconds: 1.0,
            },
        )
        .unwrap()
    }

    fn at(t0: Instant, secs: u64, value: f64) -> Sample {
        Sample::at(Metric::CpuPercent, value, t0 + Duration::from_secs(secs))
    }

    fn unavailable() -> SampleError {
        SampleError::unavailable("/proc/stat", io::Error::new(io::ErrorKind::NotFound, "gone"))
    }

    /// Feeds one value per second starting at t0 and returns the fired events
    /// together with the tick index at which each fired.
    fn run(m: &mut DebounceMonitor, t0: Instant, values: &[f64]) -> Vec<(usize, ActionEvent)> {
        values
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| match m.observe(&at(t0, i as u64, v)) {
                Transition::Fired(e) => Some((i, e)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = DebounceMonitor::new(
            Metric::RamPercent,
            MonitorConfig {
                threshold_percent: -1.0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(MonitorError::ConfigurationInvalid { .. })));
    }

    #[test]
    fn test_never_fires_at_or_below_threshold() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        let values: Vec<f64> = (0..100).map(|i| (i % 81) as f64).collect();
        assert!(run(&mut m, t0, &values).is_empty());
        assert!(!m.state().in_excursion());
    }

    #[test]
    fn test_fires_once_at_tick_15() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        let fired = run(&mut m, t0, &[85.0; 20]);

        assert_eq!(fired.len(), 1);
        let (tick, event) = &fired[0];
        assert_eq!(*tick, 15);
        assert_eq!(event.duration_exceeded, Duration::from_secs(15));
        assert_eq!(event.triggered_at, t0 + Duration::from_secs(15));
        assert_eq!(event.metric_name, "cpu_percent");
        assert_eq!(event.value, 85.0);
    }

    #[test]
    fn test_dip_resets_timer() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        let mut values = vec![85.0; 10];
        values.push(50.0);
        values.extend([85.0; 10]);
        assert!(run(&mut m, t0, &values).is_empty());
    }

    #[test]
    fn test_new_excursion_fires_again() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 5.0);
        let mut values = vec![90.0; 8];
        values.push(10.0);
        values.extend([90.0; 8]);

        let fired = run(&mut m, t0, &values);
        let ticks: Vec<usize> = fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![5, 14]);
    }

    #[test]
    fn test_equal_to_threshold_is_not_exceeding() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 0.0);
        assert!(run(&mut m, t0, &[80.0; 30]).is_empty());
        assert!(!m.state().in_excursion());
    }

    #[test]
    fn test_equal_value_ends_excursion() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        m.observe(&at(t0, 0, 81.0));
        assert_eq!(
            m.observe(&at(t0, 3, 80.0)),
            Transition::Recovered {
                after: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn test_unavailable_holds_excursion() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        for i in 0..10 {
            m.observe(&at(t0, i, 85.0));
        }
        let since = m.state().sustained_since;
        assert_eq!(m.observe_unavailable(&unavailable()), Transition::Held);
        assert_eq!(m.state().sustained_since, since);

        // The hole at t=10 does not reset the clock: t=15 still fires.
        let mut fired = 0;
        for i in 11..20 {
            if let Transition::Fired(e) = m.observe(&at(t0, i, 85.0)) {
                assert_eq!(e.duration_exceeded, Duration::from_secs(15));
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_unavailable_does_not_start_excursion() {
        let mut m = monitor(80.0, 15.0);
        for _ in 0..30 {
            assert_eq!(m.observe_unavailable(&unavailable()), Transition::Held);
        }
        assert!(!m.state().in_excursion());
    }

    #[test]
    fn test_transitions_sequence() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 2.0);
        assert_eq!(m.observe(&at(t0, 0, 10.0)), Transition::Normal);
        assert_eq!(m.observe(&at(t0, 1, 90.0)), Transition::Entered);
        assert_eq!(
            m.observe(&at(t0, 2, 90.0)),
            Transition::Sustained {
                elapsed: Duration::from_secs(1)
            }
        );
        assert!(matches!(m.observe(&at(t0, 3, 90.0)), Transition::Fired(_)));
        assert_eq!(
            m.observe(&at(t0, 4, 90.0)),
            Transition::AlreadyFired {
                elapsed: Duration::from_secs(3)
            }
        );
        assert_eq!(
            m.observe(&at(t0, 5, 10.0)),
            Transition::Recovered {
                after: Duration::from_secs(4)
            }
        );
        assert!(!m.state().action_fired);
    }

    #[test]
    fn test_zero_sustained_fires_on_entry() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 0.0);
        match m.observe(&at(t0, 0, 95.0)) {
            Transition::Fired(e) => assert_eq!(e.duration_exceeded, Duration::ZERO),
            other => panic!("expected Fired, got {other:?}"),
        }
    }

    #[test]
    fn test_wall_clock_not_tick_count() {
        // Two samples 20 s apart exceed a 15 s window even though only two
        // ticks were observed.
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        assert_eq!(m.observe(&at(t0, 0, 85.0)), Transition::Entered);
        assert!(matches!(m.observe(&at(t0, 20, 85.0)), Transition::Fired(_)));
    }

    #[test]
    fn test_nan_is_held() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        m.observe(&at(t0, 0, 85.0));
        assert_eq!(m.observe(&at(t0, 1, f64::NAN)), Transition::Held);
        assert!(m.state().in_excursion());
        assert_eq!(m.state().last_value, 85.0);
    }

    #[test]
    fn test_foreign_metric_is_held() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        let ram = Sample::at(Metric::RamPercent, 99.0, t0);
        assert_eq!(m.observe(&ram), Transition::Held);
        assert!(!m.state().in_excursion());
    }

    #[test]
    fn test_status_line() {
        let t0 = Instant::now();
        let mut m = monitor(80.0, 15.0);
        m.observe(&at(t0, 0, 85.0));
        assert_eq!(m.status_line(t0 + Duration::from_secs(3)), "CPU: 85.0% (high for 3.0s)");
        m.observe(&at(t0, 4, 20.0));
        assert_eq!(m.status_line(t0 + Duration::from_secs(5)), "CPU: 20.0%");
    }

    #[test]
    fn test_reason() {
        let event = ActionEvent {
            metric_name: "ram_percent".into(),
            duration_exceeded: Duration::from_secs(15),
            triggered_at: Instant::now(),
            value: 91.3,
            threshold: 80.0,
        };
        assert_eq!(
            event.reason(),
            "ram_percent exceeded 80 for 15.0 seconds (last value 91.3)"
        );
    }
}
