//! CLI output formatting.
//!
//! Each command has a `format_*` function returning lines (pure, testable)
//! and, where useful, a `print_*` wrapper that writes them to stdout.
//!
//! ## Plan
//!
//! ```text
//! 001 a.jpg
//!     webp 2500px q80 → a.jpg@large.webp (done)
//!     webp 1000px q80 → a.jpg@medium.webp
//! 002 sub/b.png
//!     webp 2500px q80 → sub/b.png@large.webp
//!
//! 2 originals, 3 jobs (1 done, 2 pending)
//! ```
//!
//! ## Check
//!
//! ```text
//! Config OK
//!     Broker: amqp://***@localhost:5672/%2f (queue image-jobs)
//!     Originals: originals
//!     Optimized: optimized
//!     Publisher: on (0.0.0.0:8000, auth off, scan before serve off)
//!     Consumer: on
//! Tiers
//! 001 large 2500px q80
//! Formats
//!     webp
//! ```

use crate::config::AppConfig;
use crate::job::JobSpec;
use crate::publisher::PublishSummary;
use std::path::{Path, PathBuf};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Show `path` relative to `root` when it lies under it.
fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Hide the credentials part of a broker URI.
fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &uri[..scheme_end + 3], &uri[at..])
        }
        _ => uri.to_string(),
    }
}

// ============================================================================
// Plan
// ============================================================================

/// One job in a plan, with whether its target is already on disk.
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub job: JobSpec,
    pub done: bool,
}

/// All planned jobs for one original.
#[derive(Debug, Clone)]
pub struct PlannedSource {
    pub original: PathBuf,
    pub jobs: Vec<PlannedJob>,
}

/// Group scanned jobs by original, keeping scan order.
///
/// Jobs for the same original arrive consecutively from a scan, so grouping
/// only needs to compare with the previous entry.
pub fn group_plan(jobs: impl IntoIterator<Item = JobSpec>) -> Vec<PlannedSource> {
    let mut plan: Vec<PlannedSource> = Vec::new();
    for job in jobs {
        let done = job.is_already_done();
        let planned = PlannedJob { job, done };
        match plan.last_mut() {
            Some(source) if source.original == planned.job.original_path => {
                source.jobs.push(planned)
            }
            _ => plan.push(PlannedSource {
                original: planned.job.original_path.clone(),
                jobs: vec![planned],
            }),
        }
    }
    plan
}

/// Format a plan. With `pending_only`, finished jobs and originals with
/// nothing left to do are hidden; the totals still count everything.
pub fn format_plan(
    plan: &[PlannedSource],
    source_root: &Path,
    output_root: &Path,
    pending_only: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut position = 0;
    let mut total = 0;
    let mut done = 0;

    for source in plan {
        total += source.jobs.len();
        done += source.jobs.iter().filter(|j| j.done).count();

        let shown: Vec<&PlannedJob> = source
            .jobs
            .iter()
            .filter(|j| !(pending_only && j.done))
            .collect();
        if shown.is_empty() {
            continue;
        }
        position += 1;
        lines.push(format!(
            "{} {}",
            format_index(position),
            relative_display(&source.original, source_root)
        ));
        for planned in shown {
            let job = &planned.job;
            let mut line = format!(
                "{}{} {}px q{} → {}",
                indent(1),
                job.format,
                job.max_width,
                job.quality,
                relative_display(&job.optimized_path, output_root)
            );
            if planned.done {
                line.push_str(" (done)");
            }
            lines.push(line);
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{} originals, {} jobs ({} done, {} pending)",
        plan.len(),
        total,
        done,
        total - done
    ));
    lines
}

pub fn print_plan(plan: &[PlannedSource], source_root: &Path, output_root: &Path, pending_only: bool) {
    for line in format_plan(plan, source_root, output_root, pending_only) {
        println!("{}", line);
    }
}

// ============================================================================
// Scan
// ============================================================================

pub fn format_publish_summary(summary: &PublishSummary) -> String {
    let mut line = format!(
        "Published {} jobs, skipped {} already optimized",
        summary.published, summary.skipped
    );
    if summary.rejected > 0 {
        line.push_str(&format!(", rejected {} unencodable", summary.rejected));
    }
    if summary.scan_failed {
        line.push_str(" (scan stopped early, see log)");
    }
    line
}

// ============================================================================
// Check
// ============================================================================

/// Summarise a validated config.
pub fn format_config_summary(config: &AppConfig) -> Vec<String> {
    let mut lines = vec!["Config OK".to_string()];
    lines.push(format!(
        "{}Broker: {} (queue {})",
        indent(1),
        redact_uri(&config.amqp.uri),
        config.amqp.queue_name
    ));
    lines.push(format!("{}Originals: {}", indent(1), config.storage.originals.display()));
    lines.push(format!("{}Optimized: {}", indent(1), config.storage.optimized.display()));

    let publisher = &config.publisher;
    if publisher.enable {
        lines.push(format!(
            "{}Publisher: on ({}, auth {}, scan before serve {})",
            indent(1),
            publisher.bind,
            on_off(publisher.api_key.is_some()),
            on_off(publisher.scan_before)
        ));
    } else {
        lines.push(format!("{}Publisher: off", indent(1)));
    }
    lines.push(format!("{}Consumer: {}", indent(1), on_off(config.consumer.enable)));

    lines.push("Tiers".to_string());
    for (i, tier) in config.tiers.iter().enumerate() {
        lines.push(format!(
            "{} {} {}px q{}",
            format_index(i + 1),
            tier.name,
            tier.max_width,
            tier.quality
        ));
    }
    lines.push("Formats".to_string());
    for format in &config.formats.enabled {
        lines.push(format!("{}{}", indent(1), format));
    }
    lines
}

pub fn print_config_summary(config: &AppConfig) {
    for line in format_config_summary(config) {
        println!("{}", line);
    }
}
