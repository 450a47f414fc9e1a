// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch kmsg`: follow `/dev/kmsg`, re-log each record and keep a
//! rotated plain-text `kernel.log`.
//!
//! Reads from the device block, so they happen on a plain thread that
//! forwards records over a channel; the async side only waits on the
//! channel and Ctrl-C. A regular file is read to the end and the command
//! exits.

use anyhow::Context;
use kernel_log::{
    Classifier, KernelLogError, KmsgReader, KmsgRecord, RotatingFile, Severity, SeverityRouter,
    TextLog,
};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::PathBuf;
use tokio::sync::mpsc;

pub(crate) const CHANNEL_CAPACITY: usize = 256;

/// Where records go besides the tracing output.
#[derive(Debug, Default)]
pub struct KmsgOutputs {
    /// Every record, as `time | LEVEL | message`.
    pub log_file: Option<RotatingFile>,
    /// Records at or above the minimum severity, as JSON lines.
    pub route_dir: Option<PathBuf>,
    pub min_severity: Option<Severity>,
    /// `(max_bytes, keep)` for the routed files; library defaults if unset.
    pub rotation: Option<(u64, usize)>,
}

pub async fn execute(source: PathBuf, outputs: KmsgOutputs) -> anyhow::Result<()> {
    let classifier = Classifier::with_default_patterns()?;
    let router = outputs
        .route_dir
        .map(SeverityRouter::new)
        .transpose()?
        .map(|router| match outputs.rotation {
            Some((max_bytes, keep)) => router.with_rotation(max_bytes, keep),
            None => router,
        });
    let text_log = outputs.log_file.map(TextLog::new).transpose()?;
    let min_severity = outputs.min_severity.unwrap_or(Severity::Debug);
    let file = File::open(&source).with_context(|| format!("opening {}", source.display()))?;

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let reader_source = source.clone();
    std::thread::spawn(move || read_records(file, reader_source, tx));

    match &text_log {
        Some(log) => tracing::info!(
            "kernel logger started on {}, writing {}",
            source.display(),
            log.path().display()
        ),
        None => tracing::info!("kernel logger started on {}", source.display()),
    }
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut seen = 0u64;
    loop {
        tokio::select! {
            record = rx.recv() => {
                let Some(record) = record else { break };
                seen += 1;
                handle_record(
                    &record,
                    &classifier,
                    text_log.as_ref(),
                    router.as_ref(),
                    min_severity,
                )?;
            }
            _ = &mut ctrl_c => {
                tracing::info!("interrupt received");
                break;
            }
        }
    }
    tracing::info!("kernel logger stopped after {seen} record(s)");
    Ok(())
}

fn handle_record(
    record: &KmsgRecord,
    classifier: &Classifier,
    text_log: Option<&TextLog>,
    router: Option<&SeverityRouter>,
    min_severity: Severity,
) -> anyhow::Result<()> {
    let severity = record.effective_severity(classifier);
    kernel_log::emit(severity, &record.message);
    if let Some(log) = text_log {
        log.write(severity, &record.message)?;
    }

    // Lower ordinal means more severe.
    if severity > min_severity {
        return Ok(());
    }
    if let Some(router) = router {
        let context = serde_json::json!({
            "sequence": record.sequence,
            "level": record.level_name(),
            "facility": record.facility,
            "uptime_seconds": record.timestamp().as_secs_f64(),
        });
        router.record(severity, &record.message, context)?;
    }
    Ok(())
}

/// Runs on a dedicated thread until EOF, a fatal read error, or the
/// receiver going away.
fn read_records(file: File, source: PathBuf, tx: mpsc::Sender<KmsgRecord>) {
    for item in KmsgReader::new(BufReader::new(file), source) {
        match item {
            Ok(record) => {
                if tx.blocking_send(record).is_err() {
                    return;
                }
            }
            Err(KernelLogError::MalformedRecord { detail }) => {
                tracing::warn!("skipping kmsg record: {detail}");
            }
            // The ring buffer overwrote records we had not read yet.
            Err(KernelLogError::Io { source, .. }) if source.kind() == ErrorKind::BrokenPipe => {
                tracing::warn!("kernel log buffer overrun, some messages were lost");
            }
            Err(e) => {
                tracing::error!("error reading kernel messages: {e}");
                return;
            }
        }
    }
}
