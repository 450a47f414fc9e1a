// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

pub mod analyze;
pub mod classify;
pub mod crash;
pub mod journal;
pub mod kmsg;
pub mod power;
pub mod status;
pub mod watch;

use tracing_subscriber::EnvFilter;

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows `verbosity`
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Renders a 20-cell bar for a 0.0-1.0 ratio, switching glyphs at 70%/90%.
pub fn usage_bar(ratio: f64) -> String {
    let filled = ((ratio * 20.0).round().max(0.0) as usize).min(20);
    let symbol = if ratio >= 0.9 {
        "#"
    } else if ratio >= 0.7 {
        "="
    } else {
        "-"
    };
    format!("[{}{}]", symbol.repeat(filled), ".".repeat(20 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_bar() {
        assert_eq!(usage_bar(0.0), format!("[{}]", ".".repeat(20)));
        assert_eq!(usage_bar(0.5), format!("[{}{}]", "-".repeat(10), ".".repeat(10)));
        assert_eq!(usage_bar(0.95), format!("[{}{}]", "#".repeat(19), "."));
        assert_eq!(usage_bar(1.7), format!("[{}]", "#".repeat(20)));
    }
}
