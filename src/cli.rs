//! Command handler functions for the hector CLI.
//!
//! Handlers return their results instead of printing, so they can be tested
//! without capturing stdout.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::bitbucket::{CommentSink, Environment};
use crate::clock::Timestamp;
use crate::diff::{GeneratorOutput, ReportGenerator};
use crate::{model, report};

/// Locations of the two JSON reports a comment is rendered from.
#[derive(Debug, Clone)]
pub struct ReportFiles {
    /// coverage.py JSON report.
    pub coverage: PathBuf,
    /// diff-cover JSON report.
    pub diff_coverage: PathBuf,
}

/// Result of one report cycle, before delivery.
#[derive(Debug)]
pub struct RenderedReport {
    pub gate: GeneratorOutput,
    pub comment: String,
}

/// Generate (or reuse) the reports, parse them and render the comment.
pub fn cmd_render(
    generator: &dyn ReportGenerator,
    files: &ReportFiles,
    env: &Environment,
    clock: &dyn Timestamp,
) -> Result<RenderedReport> {
    let gate = generator.generate()?;
    if !gate.success() {
        warn!(exit_code = gate.exit_code, "coverage gate failed");
    }

    let diff_cov = model::load_diff_coverage(&files.diff_coverage)
        .with_context(|| format!("Failed to load {}", files.diff_coverage.display()))?;
    let cov = model::load_coverage(&files.coverage)
        .with_context(|| format!("Failed to load {}", files.coverage.display()))?;
    debug!(
        diff = diff_cov.diff_name().unwrap_or("unknown"),
        files = diff_cov.per_file_stats().len(),
        "parsed reports"
    );
    let impacted = diff_cov
        .per_file_stats()
        .iter()
        .filter(|(_, stat)| stat.percent_covered < 100.0);
    for (path, stat) in impacted {
        debug!("{}", report::format_file_line(path, stat));
    }

    let ctx = env.render_context(gate.exit_code, clock);
    let comment = report::render(Some(&cov), Some(&diff_cov), &ctx)?;
    Ok(RenderedReport { gate, comment })
}

/// Hand the comment to the sink, failing on a non-success status.
pub fn cmd_deliver(comment: &str, sink: &dyn CommentSink) -> Result<String> {
    let (status, body) = sink.submit(comment)?;
    debug!(status, %body, "comment response");
    if !(200..300).contains(&status) {
        bail!("Comment was rejected (HTTP {}): {}", status, body);
    }
    info!(status, destination = sink.target(), "comment posted");
    Ok(format!("Comment posted (HTTP {status})\n"))
}
