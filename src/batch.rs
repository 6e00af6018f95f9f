//! Parallel parsing of many report files using tokio

use log::{debug, error, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{CoverageError, Result};
use crate::node::Node;
use crate::parser::{ParserKind, ParserOptions};
use crate::warnings::{Warnings, DEFAULT_MAX_LINES};

/// One report file and the format to read it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    pub path: PathBuf,
    pub kind: ParserKind,
}

impl ReportJob {
    pub fn new(path: impl Into<PathBuf>, kind: ParserKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Outcome of parsing one report
#[derive(Debug)]
pub struct ParsedReport {
    pub path: PathBuf,
    pub kind: ParserKind,
    pub result: Result<Node>,
    pub warnings: Warnings,
}

impl ParsedReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Parses a single report on the current thread
pub fn parse_report(job: ReportJob, options: ParserOptions, max_warnings: usize) -> ParsedReport {
    let title = job.path.display().to_string();
    let mut warnings = Warnings::with_max_lines(&title, max_warnings);
    let parser = job.kind.create(options);
    debug!("Parsing {} as {}", title, job.kind);
    let result = parser.parse_file(&job.path, &mut warnings);

    ParsedReport {
        path: job.path,
        kind: job.kind,
        result,
        warnings,
    }
}

/// Report for a job whose parse task died before producing a result
fn failed_report(
    path: PathBuf,
    kind: ParserKind,
    max_warnings: usize,
    reason: impl ToString,
) -> ParsedReport {
    ParsedReport {
        warnings: Warnings::with_max_lines(&path.display().to_string(), max_warnings),
        path,
        kind,
        result: Err(CoverageError::Io(std::io::Error::other(reason.to_string()))),
    }
}

/// Parallel report parser with bounded concurrency
pub struct ParallelParser {
    max_workers: usize,
    max_warnings: usize,
    options: ParserOptions,
}

impl ParallelParser {
    pub fn new(max_workers: usize, options: ParserOptions) -> Self {
        Self {
            max_workers: max_workers.max(1),
            max_warnings: DEFAULT_MAX_LINES,
            options,
        }
    }

    pub fn with_max_warnings(mut self, max_warnings: usize) -> Self {
        self.max_warnings = max_warnings;
        self
    }

    /// Parses every job, at most `max_workers` at a time. Results are returned
    /// in the order of `jobs`.
    pub async fn parse_all(&self, jobs: Vec<ReportJob>) -> Vec<ParsedReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut join_set = JoinSet::new();
        let total = jobs.len();
        let identities: Vec<(PathBuf, ParserKind)> =
            jobs.iter().map(|job| (job.path.clone(), job.kind)).collect();

        debug!("Parsing {} report(s) with {} workers", total, self.max_workers);

        for (index, job) in jobs.into_iter().enumerate() {
            let sem = semaphore.clone();
            let options = self.options.clone();
            let max_warnings = self.max_warnings;

            join_set.spawn(async move {
                let _permit = sem.acquire().await.expect("Semaphore closed");
                let path = job.path.clone();
                let kind = job.kind;
                let report = tokio::task::spawn_blocking(move || {
                    parse_report(job, options, max_warnings)
                })
                .await
                .unwrap_or_else(|e| failed_report(path, kind, max_warnings, e));
                (index, report)
            });
        }

        let mut slots: Vec<Option<ParsedReport>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!("Parse task panicked: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(identities)
            .map(|(slot, (path, kind))| {
                slot.unwrap_or_else(|| {
                    failed_report(path, kind, self.max_warnings, "parse task did not complete")
                })
            })
            .collect()
    }

    /// Runs `parse_all` on a dedicated runtime
    pub fn parse_all_blocking(&self, jobs: Vec<ReportJob>) -> Result<Vec<ParsedReport>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.max_workers)
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.parse_all(jobs)))
    }
}

/// Merges the trees of all parsed reports, in order
///
/// With `skip_failures` a failed report is logged and left out; otherwise the
/// first failure is returned.
pub fn merge_reports(reports: Vec<ParsedReport>, skip_failures: bool) -> Result<Node> {
    let mut trees = Vec::with_capacity(reports.len());
    for report in reports {
        match report.result {
            Ok(tree) => trees.push(tree),
            Err(e) if skip_failures => warn!("Skipping {}: {}", report.path.display(), e),
            Err(e) => return Err(e),
        }
    }
    Node::merge_all(trees)
}
