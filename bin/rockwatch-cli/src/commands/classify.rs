// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `rockwatch classify`: print the severity of each line.

use anyhow::Context;
use kernel_log::Classifier;
use std::io::BufRead;

pub async fn execute(lines: Vec<String>) -> anyhow::Result<()> {
    let classifier = Classifier::with_default_patterns()?;

    if !lines.is_empty() {
        for line in &lines {
            print_verdict(&classifier, line);
        }
        return Ok(());
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        print_verdict(&classifier, &line);
    }
    Ok(())
}

fn print_verdict(classifier: &Classifier, line: &str) {
    let verdict = classifier.classify_detailed(line);
    match verdict.pattern {
        Some(pattern) => println!("{:<8}  {}  [{pattern}]", verdict.severity, line.trim()),
        None => println!("{:<8}  {}", verdict.severity, line.trim()),
    }
}
