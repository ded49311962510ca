//! Core types shared across the export/collect/upload workflow

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single issue record as returned by the issue-search API.
///
/// Records are opaque key-value objects; fields pass through unmodified into
/// tabular rows. No identity or uniqueness is enforced — duplicates across
/// paginated pages are possible and are not deduplicated.
pub type IssueRecord = serde_json::Map<String, serde_json::Value>;

/// Severity level of a vulnerability finding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Critical severity
    Critical,
    /// High severity
    High,
    /// Medium severity
    Medium,
    /// Low severity
    Low,
    /// Informational finding
    Informational,
    /// Finding not yet triaged by the scanner
    Untriaged,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Informational => "INFORMATIONAL",
            Severity::Untriaged => "UNTRIAGED",
        };
        f.write_str(name)
    }
}

/// Per-severity finding counts
///
/// Six mutually exclusive counters over finding records. Findings whose
/// severity is missing or unrecognized are not counted in any bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTally {
    /// Number of CRITICAL findings
    pub critical: u64,
    /// Number of HIGH findings
    pub high: u64,
    /// Number of MEDIUM findings
    pub medium: u64,
    /// Number of LOW findings
    pub low: u64,
    /// Number of INFORMATIONAL findings
    pub informational: u64,
    /// Number of UNTRIAGED findings
    pub untriaged: u64,
}

impl SeverityTally {
    /// Count one finding under its severity bucket
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Informational => self.informational += 1,
            Severity::Untriaged => self.untriaged += 1,
        }
    }

    /// Sum of all six counters
    #[must_use]
    pub fn total(&self) -> u64 {
        self.critical + self.high + self.medium + self.low + self.informational + self.untriaged
    }
}

/// How a single export window ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    /// Every page of the window was fetched
    Complete,
    /// Some pages landed before the window's pagination was aborted
    Partial,
    /// The window yielded no data before its pagination was aborted
    Failed,
}

/// Outcome of one date window of the issue export
///
/// Every window produces a report even when its pagination was aborted, so
/// callers can detect incomplete exports instead of scraping console logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowReport {
    /// Inclusive start of the window's created-date filter
    pub start: NaiveDate,
    /// Exclusive end of the window's created-date filter
    pub end: NaiveDate,
    /// How the window ended
    pub status: WindowStatus,
    /// Issues fetched from this window (0 for failed windows)
    pub issues: u64,
    /// The error that aborted the window, if any
    pub error: Option<String>,
}

/// Aggregated result of the issue export
#[must_use]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportReport {
    /// Per-window outcomes, in window order
    pub windows: Vec<WindowReport>,
    /// Total issue rows written to the artifact
    pub total_issues: u64,
    /// Number of flush operations performed on the artifact
    pub flushes: u32,
    /// Path of the written artifact
    pub artifact: PathBuf,
}

impl ExportReport {
    /// True when every window completed without an aborted pagination
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.windows
            .iter()
            .all(|w| w.status == WindowStatus::Complete)
    }

    /// Number of windows that did not complete
    #[must_use]
    pub fn degraded_windows(&self) -> usize {
        self.windows
            .iter()
            .filter(|w| w.status != WindowStatus::Complete)
            .count()
    }
}

/// Remote status of an asynchronous findings-report job
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportJobStatus {
    /// The report is still being generated
    InProgress,
    /// The report was written to the destination bucket
    Succeeded,
    /// Report generation failed remotely
    Failed {
        /// Remote failure description, when the API provided one
        reason: Option<String>,
    },
    /// The job was cancelled remotely
    Cancelled,
}

/// One page of the live findings listing
#[derive(Clone, Debug, Default)]
pub struct FindingsPage {
    /// Severities of the findings on this page, in listing order.
    ///
    /// Findings with no recognizable severity are represented as `None`.
    pub severities: Vec<Option<Severity>>,
    /// Opaque cursor for the next page; `None` on the final page
    pub next_token: Option<String>,
}

/// An object in the report destination bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Object key within the bucket
    pub key: String,
    /// Last-modified timestamp reported by the store
    pub last_modified: DateTime<Utc>,
}

/// Result of the finding collection step
#[must_use]
#[derive(Clone, Debug)]
pub struct CollectorOutcome {
    /// Identifier of the report job that produced the artifact
    pub report_id: String,
    /// Severity tally over the live findings listing
    pub tally: SeverityTally,
    /// Key of the bucket object that was downloaded
    pub object_key: String,
    /// Path of the downloaded artifact
    pub artifact: PathBuf,
}

/// Combined result of a full pipeline run
#[must_use]
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Issue export result, including per-window outcomes
    pub export: ExportReport,
    /// Finding collection result, including the severity tally
    pub findings: CollectorOutcome,
}
