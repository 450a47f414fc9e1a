// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Network link health from `/sys/class/net/<iface>/operstate`, optionally
//! confirmed by pinging the interface's default gateway.

use crate::thermal::read_sysfs_file;
use crate::SampleError;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Directory holding one entry per network interface, relative to the sysfs root.
pub(crate) const NET_CLASS: &str = "class/net";

/// Operational state of a network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// `operstate` reads `up`.
    Up,
    /// Any other `operstate` (`down`, `dormant`, `unknown`, ...), or no interface.
    Down(String),
}

impl LinkState {
    /// Reads the state of `iface` under `sys_root`.
    ///
    /// A missing interface is reported as down rather than unavailable: a
    /// USB Wi-Fi adapter that dropped off the bus is exactly the condition
    /// the link watchdog exists to catch.
    pub fn read(sys_root: &Path, iface: &str) -> Result<Self, SampleError> {
        let iface_dir = sys_root.join(NET_CLASS).join(iface);
        if !iface_dir.exists() {
            return Ok(LinkState::Down(format!("{iface} not present")));
        }
        let state = read_sysfs_file(&iface_dir.join("operstate"))?;
        if state == "up" {
            Ok(LinkState::Up)
        } else {
            Ok(LinkState::Down(state))
        }
    }

    /// The metric value: `1.0` when down, `0.0` when up.
    pub fn as_metric(&self) -> f64 {
        match self {
            LinkState::Up => 0.0,
            LinkState::Down(_) => 1.0,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, LinkState::Up)
    }
}

/// Extracts the gateway from `ip route show dev <iface>` output.
///
/// Only the `default via <gateway> ...` line counts.
pub fn parse_default_gateway(routes: &str) -> Option<String> {
    routes.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        if words.next()? != "default" {
            return None;
        }
        words
            .skip_while(|w| *w != "via")
            .nth(1)
            .map(str::to_string)
    })
}

/// Reachability check layered on top of `operstate`: an interface that is
/// up but cannot reach its default gateway counts as down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayCheck {
    ping_timeout: Duration,
}

impl GatewayCheck {
    pub fn new(ping_timeout: Duration) -> Self {
        Self { ping_timeout }
    }

    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    /// Looks up the default gateway of `iface` and pings it once.
    ///
    /// A missing `ip` or `ping` binary is unavailable, not down.
    pub fn check(&self, iface: &str) -> Result<LinkState, SampleError> {
        let output = Command::new("ip")
            .args(["route", "show", "dev", iface])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SampleError::unavailable("ip route", e))?;
        if !output.status.success() {
            return Ok(LinkState::Down(format!("no routes for {iface}")));
        }
        let Some(gateway) = parse_default_gateway(&String::from_utf8_lossy(&output.stdout)) else {
            return Ok(LinkState::Down(format!("no default route via {iface}")));
        };

        let wait = self.ping_timeout.as_secs_f64().ceil().max(1.0).to_string();
        let status = Command::new("ping")
            .args(["-c", "1", "-W", wait.as_str(), gateway.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| SampleError::unavailable("ping", e))?;
        if status.success() {
            Ok(LinkState::Up)
        } else {
            Ok(LinkState::Down(format!("gateway {gateway} unreachable")))
        }
    }
}

impl Default for GatewayCheck {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

/// Finds the first wireless interface (`wl*`) under `sys_root`, by name.
pub fn find_wireless_interface(sys_root: &Path) -> Option<String> {
    let entries = std::fs::read_dir(sys_root.join(NET_CLASS)).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("wl"))
        .collect();
    names.sort();
    names.into_iter().next()
}
