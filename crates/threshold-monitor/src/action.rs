// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Corrective actions dispatched when an excursion lasts too long.
//!
//! Dispatch is fire-and-forget: the caller logs a failure and moves on.
//! A reboot is expected to end the process before anything else happens.
//!
//! Actions are synchronous and may block (grace periods, child
//! processes). [`MonitorLoop`](crate::MonitorLoop) runs them on the tokio
//! blocking pool.

use crate::{ActionError, ActionEvent, UsbRebind};
use parking_lot::Mutex;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

/// A side-effecting response to an [`ActionEvent`].
pub trait CorrectiveAction: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Carries out the action. Called at most once per excursion.
    fn dispatch(&mut self, event: &ActionEvent) -> Result<(), ActionError>;
}

impl<A: CorrectiveAction + ?Sized> CorrectiveAction for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn dispatch(&mut self, event: &ActionEvent) -> Result<(), ActionError> {
        (**self).dispatch(event)
    }
}

/// Runs `program args..` to completion and maps a non-zero exit to an error.
fn run_command(program: &str, args: &[&str]) -> Result<(), ActionError> {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("running '{command}'");
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| ActionError::Spawn {
            command: command.clone(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(ActionError::CommandFailed {
            command,
            status: status.to_string(),
        })
    }
}

/// Notes the reason in syslog, waits a grace period, then reboots.
#[derive(Debug, Clone)]
pub struct RebootAction {
    grace: Duration,
    command: Vec<String>,
    syslog: bool,
}

impl RebootAction {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            command: vec!["reboot".to_string()],
            syslog: true,
        }
    }

    /// Enables or disables the `logger` notice written before rebooting.
    pub fn with_syslog(mut self, syslog: bool) -> Self {
        self.syslog = syslog;
        self
    }

    /// Replaces the `reboot` command (e.g. `systemctl reboot`).
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }
}

impl Default for RebootAction {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl CorrectiveAction for RebootAction {
    fn name(&self) -> &str {
        "reboot"
    }

    fn dispatch(&mut self, event: &ActionEvent) -> Result<(), ActionError> {
        let reason = event.reason();
        tracing::error!("WATCHDOG TRIGGERED: {reason}");
        tracing::error!(
            "system will reboot in {:.0} seconds",
            self.grace.as_secs_f64()
        );

        // Best effort: a missing `logger` must not prevent the reboot.
        if self.syslog {
            let notice = format!("WATCHDOG: {reason} - System rebooting");
            if let Err(e) = run_command("logger", &[notice.as_str()]) {
                tracing::warn!("could not write syslog notice: {e}");
            }
        }

        std::thread::sleep(self.grace);

        let (program, args) = self.command.split_first().ok_or_else(|| ActionError::Failed {
            action: "reboot".to_string(),
            detail: "empty reboot command".to_string(),
        })?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_command(program, &args)
    }
}

/// Bounces network interfaces with `ip link set <iface> down/up`, after
/// optionally rebinding matching USB adapters.
#[derive(Debug, Clone)]
pub struct InterfaceResetAction {
    interfaces: Vec<String>,
    pause: Duration,
    usb: Option<UsbRebind>,
}

impl InterfaceResetAction {
    pub fn new(interfaces: Vec<String>) -> Self {
        Self {
            interfaces,
            pause: Duration::from_secs(2),
            usb: None,
        }
    }

    /// Rebinds matching USB devices before the interfaces are bounced.
    pub fn with_usb_rebind(mut self, usb: UsbRebind) -> Self {
        self.usb = Some(usb);
        self
    }

    /// Time between taking an interface down and bringing it back up.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

impl CorrectiveAction for InterfaceResetAction {
    fn name(&self) -> &str {
        "interface-reset"
    }

    fn dispatch(&mut self, event: &ActionEvent) -> Result<(), ActionError> {
        if self.interfaces.is_empty() {
            return Err(ActionError::Failed {
                action: self.name().to_string(),
                detail: "no interfaces to reset".to_string(),
            });
        }
        tracing::error!("{}; restarting {}", event.reason(), self.interfaces.join(", "));

        // Attempt every device and interface even if an earlier one fails.
        let mut first_error = None;
        if let Some(usb) = &self.usb {
            let (rebound, error) = usb.run(self.pause);
            tracing::info!("rebound {rebound} USB device(s)");
            first_error = error;
        }
        for iface in &self.interfaces {
            let result = run_command("ip", &["link", "set", iface.as_str(), "down"]).and_then(|()| {
                std::thread::sleep(self.pause);
                run_command("ip", &["link", "set", iface.as_str(), "up"])
            });
            match result {
                Ok(()) => tracing::info!("restarted network interface {iface}"),
                Err(e) => {
                    tracing::error!("failed to restart {iface}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Dry run: logs what would have happened and does nothing.
#[derive(Debug, Clone)]
pub struct LogOnlyAction {
    would_run: String,
}

impl LogOnlyAction {
    pub fn new(would_run: impl Into<String>) -> Self {
        Self {
            would_run: would_run.into(),
        }
    }
}

impl CorrectiveAction for LogOnlyAction {
    fn name(&self) -> &str {
        "log-only"
    }

    fn dispatch(&mut self, event: &ActionEvent) -> Result<(), ActionError> {
        tracing::error!("[dry-run] would {}: {}", self.would_run, event.reason());
        Ok(())
    }
}

/// Records every dispatched event; used by tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingAction {
    events: Arc<Mutex<Vec<ActionEvent>>>,
    fail: bool,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose every dispatch also reports failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of the events recorded so far. Clones share one log.
    pub fn events(&self) -> Vec<ActionEvent> {
        self.events.lock().clone()
    }
}

impl CorrectiveAction for RecordingAction {
    fn name(&self) -> &str {
        "recorder"
    }

    fn dispatch(&mut self, event: &ActionEvent) -> Result<(), ActionError> {
        self.events.lock().push(event.clone());
        if self.fail {
            return Err(ActionError::Failed {
                action: self.name().to_string(),
                detail: "configured to fail".to_string(),
            });
        }
        Ok(())
    }
}
