//! Vulnerability finding collection
//!
//! Three steps against the vulnerability-management stack, in order:
//!
//! 1. Start an asynchronous findings-report job scoped to the service's
//!    container repository and image tag, destined for an encrypted bucket.
//! 2. Tally the live findings listing by severity while the job runs.
//! 3. Poll the job to completion, then download the newest object from the
//!    destination bucket as the local report artifact.
//!
//! The remote APIs sit behind the [`FindingsApi`] and [`ObjectStore`] traits
//! so the collector's control flow is exercisable without cloud credentials;
//! the production adapters live in [`aws`].

pub mod aws;

#[cfg(test)]
mod tests;

use crate::config::{InspectorConfig, PollConfig};
use crate::error::{Error, Result};
use crate::poll::{PollOutcome, poll_until};
use crate::types::{
    CollectorOutcome, FindingsPage, ReportJobStatus, SeverityTally, StoredObject,
};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Parameters of a findings-report job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRequest {
    /// Container repository the report is scoped to
    pub repository_name: String,
    /// Image tag filter
    pub image_tag: String,
    /// Destination bucket
    pub bucket: String,
    /// KMS key the report is encrypted under
    pub kms_key_arn: String,
}

/// Vulnerability-management API seam
///
/// Covers the two surfaces the collector touches: asynchronous report jobs
/// and the live findings listing.
#[async_trait]
pub trait FindingsApi: Send + Sync {
    /// Start a report job; returns the remote job identifier
    async fn start_report(&self, request: &ReportRequest) -> Result<String>;

    /// Current status of a report job
    async fn report_status(&self, report_id: &str) -> Result<ReportJobStatus>;

    /// One page of the live findings listing filtered by image tag
    ///
    /// `next_token` is the cursor returned by the previous page, or `None`
    /// for the first page.
    async fn list_findings(
        &self,
        image_tag: &str,
        next_token: Option<&str>,
    ) -> Result<FindingsPage>;
}

/// Object-storage seam for the report destination bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All objects in the bucket
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StoredObject>>;

    /// Download one object to a local file
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;
}

/// Collects the vulnerability report artifact and the live severity tally
pub struct FindingCollector {
    api: Box<dyn FindingsApi>,
    store: Box<dyn ObjectStore>,
    config: InspectorConfig,
    poll: PollConfig,
}

impl FindingCollector {
    /// Create a collector over the given API and store backends
    pub fn new(
        api: Box<dyn FindingsApi>,
        store: Box<dyn ObjectStore>,
        config: InspectorConfig,
        poll: PollConfig,
    ) -> Self {
        Self {
            api,
            store,
            config,
            poll,
        }
    }

    /// Run the collection and download the report artifact to `artifact`
    ///
    /// # Errors
    ///
    /// Returns an error when the report job cannot be started, fails or is
    /// cancelled remotely, exceeds the polling deadline, when the bucket is
    /// empty at retrieval time, or when the download itself fails.
    pub async fn collect(&self, artifact: &Path) -> Result<CollectorOutcome> {
        let request = ReportRequest {
            repository_name: self.config.repository_name.clone(),
            image_tag: self.config.image_tag.clone(),
            bucket: self.config.bucket.clone(),
            kms_key_arn: self.config.kms_key_arn.clone(),
        };

        let report_id = self.api.start_report(&request).await?;
        info!(report_id = %report_id, bucket = %self.config.bucket, "findings report job started");

        let tally = self.tally_findings().await?;
        info!(
            critical = tally.critical,
            high = tally.high,
            medium = tally.medium,
            low = tally.low,
            informational = tally.informational,
            untriaged = tally.untriaged,
            total = tally.total(),
            "live findings tallied"
        );

        self.await_report(&report_id).await?;
        let object_key = self.fetch_latest_report(artifact).await?;
        info!(
            key = %object_key,
            artifact = %artifact.display(),
            "vulnerability report downloaded"
        );

        Ok(CollectorOutcome {
            report_id,
            tally,
            object_key,
            artifact: artifact.to_path_buf(),
        })
    }

    /// Walk the live findings listing and count severities
    async fn tally_findings(&self) -> Result<SeverityTally> {
        let mut tally = SeverityTally::default();
        let mut next_token: Option<String> = None;
        let mut pages: u32 = 0;

        loop {
            let page = self
                .api
                .list_findings(&self.config.image_tag, next_token.as_deref())
                .await?;
            pages += 1;
            for severity in page.severities.iter().flatten() {
                tally.record(*severity);
            }
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(pages, total = tally.total(), "findings listing exhausted");
        Ok(tally)
    }

    /// Poll the report job until it succeeds
    async fn await_report(&self, report_id: &str) -> Result<()> {
        poll_until(&self.poll, || async {
            match self.api.report_status(report_id).await? {
                ReportJobStatus::Succeeded => Ok(PollOutcome::Ready(())),
                ReportJobStatus::InProgress => Ok(PollOutcome::Pending),
                ReportJobStatus::Failed { reason } => Err(Error::ReportJob {
                    report_id: report_id.to_string(),
                    reason: match reason {
                        Some(detail) => format!("failed: {detail}"),
                        None => "failed".to_string(),
                    },
                }),
                ReportJobStatus::Cancelled => Err(Error::ReportJob {
                    report_id: report_id.to_string(),
                    reason: "was cancelled".to_string(),
                }),
            }
        })
        .await
    }

    /// Download the most recently modified object in the destination bucket
    ///
    /// Returns the downloaded object's key. An empty bucket is an explicit
    /// error; no download is attempted.
    async fn fetch_latest_report(&self, dest: &Path) -> Result<String> {
        let objects = self.store.list_objects(&self.config.bucket).await?;

        let latest = objects
            .into_iter()
            .max_by_key(|object| object.last_modified)
            .ok_or_else(|| Error::EmptyBucket {
                bucket: self.config.bucket.clone(),
            })?;

        self.store
            .download(&self.config.bucket, &latest.key, dest)
            .await?;
        Ok(latest.key)
    }
}
