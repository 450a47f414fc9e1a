// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch journal`: follow the systemd journal and re-log each line at
//! its classified severity.
//!
//! `journalctl -f --no-pager` runs as a child process; its stdout is read
//! on a plain thread and forwarded over a channel, the same way `kmsg`
//! reads the kernel ring buffer. Ctrl-C stops the child.

use super::kmsg::CHANNEL_CAPACITY;
use anyhow::Context;
use kernel_log::{Classifier, Severity, SeverityRouter};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tokio::sync::mpsc;

#[derive(clap::Args, Debug)]
pub struct JournalArgs {
    /// Only follow this systemd unit.
    #[arg(short, long)]
    unit: Option<String>,

    /// Only follow kernel messages (`journalctl -k`).
    #[arg(short, long)]
    kernel: bool,

    /// Append lines as JSON to <DIR>/<severity>.log.
    #[arg(long)]
    route_dir: Option<PathBuf>,

    /// Least severe level that is routed.
    #[arg(long, default_value = "debug")]
    min_severity: Severity,

    /// Read journal lines from this file instead of running journalctl.
    #[arg(long)]
    file: Option<PathBuf>,
}

/// Arguments passed to `journalctl`.
fn journalctl_args(args: &JournalArgs) -> Vec<String> {
    let mut argv = vec!["-f".to_string(), "--no-pager".to_string()];
    if let Some(unit) = &args.unit {
        argv.push("-u".to_string());
        argv.push(unit.clone());
    }
    if args.kernel {
        argv.push("-k".to_string());
    }
    argv
}

pub async fn execute(args: JournalArgs) -> anyhow::Result<()> {
    let classifier = Classifier::with_default_patterns()?;
    let router = args.route_dir.clone().map(SeverityRouter::new).transpose()?;
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut child: Option<Child> = None;
    match &args.file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            std::thread::spawn(move || forward_lines(BufReader::new(file), tx));
            tracing::info!("reading journal lines from {}", path.display());
        }
        None => {
            let argv = journalctl_args(&args);
            let mut spawned = Command::new("journalctl")
                .args(&argv)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .context("starting journalctl")?;
            let stdout = spawned
                .stdout
                .take()
                .context("journalctl stdout was not captured")?;
            std::thread::spawn(move || forward_lines(BufReader::new(stdout), tx));
            tracing::info!("following journalctl {}", argv.join(" "));
            child = Some(spawned);
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut seen = 0u64;
    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                seen += 1;
                handle_line(&line, &classifier, router.as_ref(), args.min_severity)?;
            }
            _ = &mut ctrl_c => {
                tracing::info!("interrupt received");
                break;
            }
        }
    }

    if let Some(mut child) = child {
        // Already gone if journalctl exited on its own.
        let _ = child.kill();
        let _ = child.wait();
    }
    tracing::info!("journal follower stopped after {seen} line(s)");
    Ok(())
}

fn handle_line(
    line: &str,
    classifier: &Classifier,
    router: Option<&SeverityRouter>,
    min_severity: Severity,
) -> anyhow::Result<Severity> {
    let verdict = classifier.classify_detailed(line);
    kernel_log::emit(verdict.severity, line);

    if verdict.severity <= min_severity {
        if let Some(router) = router {
            let context = serde_json::json!({
                "source": "journal",
                "pattern": verdict.pattern,
            });
            router.record(verdict.severity, line.trim(), context)?;
        }
    }
    Ok(verdict.severity)
}

/// Runs on a dedicated thread until EOF or the receiver going away.
fn forward_lines<R: BufRead>(mut reader: R, tx: mpsc::Sender<String>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("error reading journal output: {e}");
                return;
            }
        }
        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        if tx.blocking_send(line).is_err() {
            return;
        }
    }
}
