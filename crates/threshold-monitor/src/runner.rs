// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The polling loop: sample → evaluate → dispatch → sleep.
//!
//! One [`MonitorLoop`] per metric. Each loop owns its sampler, its
//! monitor and its corrective action, so loops for different metrics run
//! side by side. The only thing they share is the stop signal, a
//! `tokio::sync::watch` channel flipped to `true` on interrupt.
//!
//! Sampling and dispatch are blocking (sysfs reads, `ip`, `reboot`), so
//! both run on the blocking pool. A read that outlives the sampling
//! timeout is abandoned as unknown; while it is still running, later
//! ticks report the metric as stalled instead of queueing behind it.

use crate::{
    ActionEvent, CorrectiveAction, DebounceMonitor, MonitorConfig, MonitorError, StatusThrottle,
    Transition,
};
use metric_sampler::{Metric, MetricSource, Sample, SampleError};
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// What a loop did before it stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub metric: Metric,
    /// Number of samples attempted.
    pub ticks: u64,
    /// Samples that came back unknown.
    pub unavailable: u64,
    /// Every action fired, in order.
    pub fired: Vec<ActionEvent>,
}

/// Drives one [`DebounceMonitor`] from a [`MetricSource`].
pub struct MonitorLoop<S, A> {
    monitor: DebounceMonitor,
    source: Arc<Mutex<S>>,
    action: Arc<Mutex<A>>,
    action_name: String,
    poll_interval: Duration,
    sample_timeout: Duration,
    status: StatusThrottle,
    report: LoopReport,
}

impl<S, A> MonitorLoop<S, A>
where
    S: MetricSource + Send + 'static,
    A: CorrectiveAction + 'static,
{
    /// Builds a loop. Fails fast on invalid configuration.
    pub fn new(
        metric: Metric,
        config: MonitorConfig,
        source: S,
        action: A,
    ) -> Result<Self, MonitorError> {
        let poll_interval = config.poll_interval()?;
        let monitor = DebounceMonitor::new(metric, config)?;
        Ok(Self {
            monitor,
            source: Arc::new(Mutex::new(source)),
            action_name: action.name().to_string(),
            action: Arc::new(Mutex::new(action)),
            poll_interval,
            sample_timeout: Duration::from_millis(500),
            status: StatusThrottle::new(Duration::from_secs(5)),
            report: LoopReport {
                metric,
                ticks: 0,
                unavailable: 0,
                fired: Vec::new(),
            },
        })
    }

    /// Minimum spacing of the periodic status line.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status = StatusThrottle::new(interval);
        self
    }

    /// Reads slower than this are discarded as unknown.
    pub fn with_sample_timeout(mut self, timeout: Duration) -> Self {
        self.sample_timeout = timeout;
        self
    }

    pub fn monitor(&self) -> &DebounceMonitor {
        &self.monitor
    }

    pub fn report(&self) -> &LoopReport {
        &self.report
    }

    /// Runs one sample-evaluate-dispatch cycle stamped with the runtime clock.
    ///
    /// The read runs on the blocking pool and is bounded by the sampling
    /// timeout; the action, if one fires, also runs there and is awaited.
    pub async fn tick(&mut self) -> Transition {
        let metric = self.monitor.metric();
        let started = tokio::time::Instant::now();

        let reading = if self.source.is_locked() {
            Err(SampleError::Stalled { metric })
        } else {
            let source = Arc::clone(&self.source);
            let read = tokio::task::spawn_blocking(move || source.lock().sample(metric));
            match tokio::time::timeout(self.sample_timeout, read).await {
                Ok(Ok(reading)) => reading,
                Ok(Err(join_error)) => Err(SampleError::ReadAborted {
                    metric,
                    detail: join_error.to_string(),
                }),
                Err(_) => Err(SampleError::Timeout {
                    metric,
                    elapsed: started.elapsed(),
                    limit: self.sample_timeout,
                }),
            }
        };

        let transition = self.evaluate(reading, started.elapsed(), started.into_std());
        if let Transition::Fired(event) = &transition {
            let action = Arc::clone(&self.action);
            let event = event.clone();
            let outcome =
                tokio::task::spawn_blocking(move || action.lock().dispatch(&event)).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.dispatch_failed(e),
                Err(join_error) => self.dispatch_failed(join_error),
            }
        }
        transition
    }

    /// Same as [`tick`](Self::tick) but synchronous, with an explicit
    /// timestamp and no timeout check.
    pub fn tick_at(&mut self, now: Instant) -> Transition {
        let metric = self.monitor.metric();
        let reading = self.source.lock().sample(metric);
        let transition = self.evaluate(reading, Duration::ZERO, now);
        if let Transition::Fired(event) = &transition {
            let outcome = self.action.lock().dispatch(event);
            if let Err(e) = outcome {
                self.dispatch_failed(e);
            }
        }
        transition
    }

    /// Feeds one reading to the monitor and records the outcome.
    fn evaluate(
        &mut self,
        reading: Result<f64, SampleError>,
        read_time: Duration,
        now: Instant,
    ) -> Transition {
        let metric = self.monitor.metric();
        self.report.ticks += 1;

        let reading = reading.and_then(|value| {
            if read_time > self.sample_timeout {
                Err(SampleError::Timeout {
                    metric,
                    elapsed: read_time,
                    limit: self.sample_timeout,
                })
            } else {
                Ok(value)
            }
        });

        let transition = match reading {
            Ok(value) => self.monitor.observe(&Sample::at(metric, value, now)),
            Err(e) => {
                self.report.unavailable += 1;
                self.monitor.observe_unavailable(&e)
            }
        };

        if let Transition::Fired(event) = &transition {
            self.report.fired.push(event.clone());
        }

        if self.status.ready(now) {
            tracing::info!(%metric, "{}", self.monitor.status_line(now));
        }
        transition
    }

    fn dispatch_failed(&self, error: impl Display) {
        tracing::error!(
            metric = %self.monitor.metric(),
            action = %self.action_name,
            "corrective action failed, not retrying: {error}"
        );
    }

    /// Polls until `shutdown` reads `true` (or its sender is dropped).
    ///
    /// The first sample is taken immediately; later ones follow the poll
    /// interval. A stop request interrupts both the sleep and an
    /// in-flight tick, so the loop exits without taking another sample.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LoopReport {
        let metric = self.monitor.metric();
        let config = self.monitor.config();
        tracing::info!(
            %metric,
            threshold = config.threshold_percent,
            sustained_seconds = config.sustained_seconds,
            poll_interval_seconds = config.poll_interval_seconds,
            action = %self.action_name,
            "monitor started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = self.tick() => {}
                    }
                }
            }
        }

        tracing::info!(
            %metric,
            ticks = self.report.ticks,
            fired = self.report.fired.len(),
            "monitor stopped"
        );
        self.report
    }
}
