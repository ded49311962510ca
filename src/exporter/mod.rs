//! SonarQube issue export over bounded date windows
//!
//! The exporter walks the configured created-date range in fixed-size
//! windows, keeping each paginated query under the remote API's result-count
//! ceiling. Pages accumulate into a buffer that is flushed to the CSV
//! artifact in chunks. A failing window aborts only its own pagination: it is
//! recorded in the report and the walk moves on to the next window.

mod sheet;


use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{ExportReport, IssueRecord, WindowReport, WindowStatus};
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use sheet::SheetWriter;
use std::path::PathBuf;
use tracing::{info, warn};

/// Log/error context for issue-search requests
const SEARCH_CONTEXT: &str = "SonarQube issue search";

/// Response envelope of the issue-search endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<IssueRecord>,
}

/// Exports issues from a SonarQube instance into a local CSV artifact
pub struct IssueExporter {
    http: reqwest::Client,
    config: crate::config::SonarConfig,
    artifact: PathBuf,
}

impl IssueExporter {
    /// Create an exporter from the run configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.sonar.timeout)
            .user_agent("scanpost issue exporter")
            .build()?;

        Ok(Self {
            http,
            config: config.sonar.clone(),
            artifact: config.sonar_artifact(),
        })
    }

    /// Run the export and write the artifact
    ///
    /// Walks date windows from `created_after` up to `created_before`
    /// (today when unset), records a [`WindowReport`] per window, and
    /// returns the aggregated [`ExportReport`]. The artifact file exists on
    /// return even when the export yielded no issue.
    ///
    /// # Errors
    ///
    /// Returns an error only for local artifact I/O failures; remote
    /// failures degrade the affected window instead of failing the run.
    pub async fn export(&self) -> Result<ExportReport> {
        let range_end = self
            .config
            .created_before
            .unwrap_or_else(|| Utc::now().date_naive());

        info!(
            project = %self.config.project_key,
            from = %self.config.created_after,
            until = %range_end,
            "starting issue export"
        );

        let mut sheet = SheetWriter::new(self.artifact.clone(), self.config.flush_threshold);
        let mut windows = Vec::new();
        let mut fetched_total: u64 = 0;

        let mut window_start = self.config.created_after;
        while window_start < range_end {
            let window_end = window_start
                .checked_add_days(Days::new(u64::from(self.config.window_days)))
                .unwrap_or(range_end)
                .min(range_end);

            let report = self
                .export_window(window_start, window_end, &mut sheet)
                .await?;
            fetched_total += report.issues;
            info!(
                from = %report.start,
                until = %report.end,
                issues = report.issues,
                running_total = fetched_total,
                "window finished"
            );
            windows.push(report);

            window_start = window_end;
        }

        let stats = sheet.finish()?;
        let report = ExportReport {
            windows,
            total_issues: stats.rows,
            flushes: stats.flushes,
            artifact: self.artifact.clone(),
        };

        if report.is_complete() {
            info!(
                issues = report.total_issues,
                flushes = report.flushes,
                artifact = %report.artifact.display(),
                "issue export completed"
            );
        } else {
            warn!(
                issues = report.total_issues,
                degraded_windows = report.degraded_windows(),
                artifact = %report.artifact.display(),
                "issue export completed with skipped windows"
            );
        }
        Ok(report)
    }

    /// Paginate one date window into the sheet
    ///
    /// Remote failures end the window's pagination and are captured in the
    /// returned report; only local artifact I/O errors propagate.
    async fn export_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        sheet: &mut SheetWriter,
    ) -> Result<WindowReport> {
        let mut page: u32 = 1;
        let mut fetched: u64 = 0;

        loop {
            match self.fetch_page(start, end, page).await {
                Ok(issues) => {
                    let page_len = issues.len();
                    fetched += page_len as u64;
                    for record in issues {
                        sheet.push(record)?;
                    }
                    // A short page is the final page
                    if page_len < self.config.page_size as usize {
                        return Ok(WindowReport {
                            start,
                            end,
                            status: WindowStatus::Complete,
                            issues: fetched,
                            error: None,
                        });
                    }
                    page += 1;
                }
                Err(err) => {
                    log_window_failure(&err, start, end);
                    let status = if fetched > 0 {
                        WindowStatus::Partial
                    } else {
                        WindowStatus::Failed
                    };
                    return Ok(WindowReport {
                        start,
                        end,
                        status,
                        issues: fetched,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
    }

    /// Fetch one page of issues created within `[start, end)`
    async fn fetch_page(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        page: u32,
    ) -> Result<Vec<IssueRecord>> {
        let url = format!("{}/api/issues/search", self.config.base_url);
        let created_after = start.to_string();
        let created_before = end.to_string();
        let page_size = self.config.page_size.to_string();
        let page_number = page.to_string();

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.token, Some(""))
            .query(&[
                ("componentKeys", self.config.project_key.as_str()),
                ("createdAfter", created_after.as_str()),
                ("createdBefore", created_before.as_str()),
                ("ps", page_size.as_str()),
                ("p", page_number.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                context: SEARCH_CONTEXT.to_string(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&text).map_err(|e| {
            Error::MalformedResponse {
                context: SEARCH_CONTEXT.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(parsed.issues)
    }
}

/// Category-specific logging for an aborted window, matching the failure
/// classes the remote actually produces
fn log_window_failure(err: &Error, start: NaiveDate, end: NaiveDate) {
    match err {
        Error::Api { status: 401, .. } => {
            warn!(from = %start, until = %end, "authentication failed; check the API token")
        }
        Error::Api { status: 403, .. } => {
            warn!(from = %start, until = %end, "access denied; check project permissions")
        }
        Error::Api { status: 404, .. } => {
            warn!(from = %start, until = %end, "project not found; check the project key and base URL")
        }
        Error::Api { status, .. } => {
            warn!(from = %start, until = %end, status, "issue search failed")
        }
        Error::Network(e) if e.is_timeout() => {
            warn!(from = %start, until = %end, "issue search timed out; window skipped")
        }
        Error::Network(e) if e.is_connect() => {
            warn!(from = %start, until = %end, "connection error; window skipped")
        }
        Error::Network(e) => {
            warn!(from = %start, until = %end, error = %e, "transport error; window skipped")
        }
        Error::MalformedResponse { message, .. } => {
            warn!(from = %start, until = %end, error = %message, "unparseable response; window skipped")
        }
        other => warn!(from = %start, until = %end, error = %other, "window skipped"),
    }
}
