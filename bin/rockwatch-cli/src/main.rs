// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # rockwatch
//!
//! Board watchdog and kernel log tooling for ARM single-board computers.
//!
//! ## Usage
//! ```bash
//! # Reboot if CPU or RAM stays above 80% for 15 s (Ctrl-C to stop)
//! rockwatch watch --config /etc/rockwatch.toml
//!
//! # Same, but only log what would happen
//! rockwatch watch --dry-run --ram-threshold 90 --link --interface wlan0
//!
//! # One-shot metric readout
//! rockwatch status
//!
//! # Classify lines, analyse a build log, follow /dev/kmsg or the journal
//! rockwatch classify "Kernel panic: oops"
//! rockwatch analyze logs/build/kernel_build.log --route-dir /var/log/kernel/analysis
//! rockwatch kmsg --route-dir /var/log/kernel
//! rockwatch journal --unit NetworkManager.service
//!
//! # PMIC voltage/current history
//! rockwatch power --count 60
//!
//! # Boot-time crash detection, dmesg and failed-unit scan
//! rockwatch crash-check
//! rockwatch crash-scan
//! ```

mod commands;

use clap::{Parser, Subcommand};
use kernel_log::{RotatingFile, DEFAULT_KEEP_LOGS, DEFAULT_MAX_LOG_BYTES};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rockwatch",
    about = "Board watchdog and kernel log tooling for ARM single-board computers",
    version,
    author
)]
struct Cli {
    /// Path to a TOML watchdog configuration file (CLI flags override it).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor CPU, RAM and link health; act on sustained excursions.
    Watch(commands::watch::WatchArgs),

    /// Print current metric values against the configured thresholds.
    Status {
        /// Interface whose link state is shown (default: first wl* interface).
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Classify log lines by severity (reads stdin when no line is given).
    Classify {
        /// Lines to classify.
        lines: Vec<String>,
    },

    /// Classify every line of a log file and summarise.
    Analyze {
        /// Log file to analyse.
        file: PathBuf,

        /// Append critical/error lines as JSON to <DIR>/<severity>.log.
        #[arg(long)]
        route_dir: Option<PathBuf>,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Follow kernel messages and log them at their effective severity.
    Kmsg {
        /// kmsg-formatted source (device or file).
        #[arg(long, default_value = "/dev/kmsg")]
        source: PathBuf,

        /// Append records as JSON to <DIR>/<severity>.log.
        #[arg(long)]
        route_dir: Option<PathBuf>,

        /// Least severe level that is routed.
        #[arg(long, default_value = "debug")]
        min_severity: kernel_log::Severity,

        /// Plain-text log of every record (read back by crash-check).
        #[arg(long, default_value = "/var/log/kernel/kernel.log")]
        log_file: PathBuf,

        /// Do not write the plain-text log.
        #[arg(long)]
        no_log_file: bool,

        /// Rotate the plain-text and routed logs past this many bytes.
        #[arg(long, default_value_t = DEFAULT_MAX_LOG_BYTES)]
        max_log_bytes: u64,

        /// Rotated copies kept per log.
        #[arg(long, default_value_t = DEFAULT_KEEP_LOGS)]
        keep_logs: usize,
    },

    /// Follow the systemd journal and log each line at its severity.
    Journal(commands::journal::JournalArgs),

    /// Sample PMIC voltage/current and keep a JSON history.
    Power(commands::power::PowerArgs),

    /// Detect an unclean previous shutdown and write a crash report.
    CrashCheck(commands::crash::CrashCheckArgs),

    /// Scan dmesg for crash and OOM-kill lines, and systemd for failed units.
    CrashScan {
        /// Read this file instead of running `dmesg`.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Read `systemctl --failed` output from this file.
        #[arg(long)]
        units_file: Option<PathBuf>,

        /// Print indicators as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Long-running commands report progress at info level by default.
    fn base_verbosity(&self) -> u8 {
        match self {
            Commands::Watch(_)
            | Commands::Kmsg { .. }
            | Commands::Journal(_)
            | Commands::Power(_)
            | Commands::CrashCheck(_) => 1,
            _ => 0,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose.saturating_add(cli.command.base_verbosity()));

    match cli.command {
        Commands::Watch(args) => commands::watch::execute(cli.config, args).await,
        Commands::Status { interface } => commands::status::execute(cli.config, interface).await,
        Commands::Classify { lines } => commands::classify::execute(lines).await,
        Commands::Analyze {
            file,
            route_dir,
            json,
        } => commands::analyze::execute(file, route_dir, json).await,
        Commands::Kmsg {
            source,
            route_dir,
            min_severity,
            log_file,
            no_log_file,
            max_log_bytes,
            keep_logs,
        } => {
            let outputs = commands::kmsg::KmsgOutputs {
                log_file: (!no_log_file)
                    .then(|| RotatingFile::new(log_file).with_rotation(max_log_bytes, keep_logs)),
                route_dir,
                min_severity: Some(min_severity),
                rotation: Some((max_log_bytes, keep_logs)),
            };
            commands::kmsg::execute(source, outputs).await
        }
        Commands::Journal(args) => commands::journal::execute(args).await,
        Commands::Power(args) => commands::power::execute(args).await,
        Commands::CrashCheck(args) => commands::crash::check(args).await,
        Commands::CrashScan {
            file,
            units_file,
            json,
        } => commands::crash::scan(file, units_file, json).await,
    }
}
