//! Sequential pipeline orchestration
//!
//! Runs the three steps in fixed order with no concurrency:
//! issue export, then finding collection, then attachment upload. Each step's
//! contract with the next is the artifact file it leaves on local disk.

use crate::collector::aws::{Inspector2Api, S3Store};
use crate::collector::{FindingCollector, FindingsApi, ObjectStore};
use crate::config::Config;
use crate::error::Result;
use crate::exporter::IssueExporter;
use crate::types::RunSummary;
use crate::uploader::AttachmentUploader;
use tracing::info;

/// Runs the export → collect → upload sequence
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Create a pipeline over the given run configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run against the production backends
    ///
    /// AWS credentials and region come from the ambient environment the way
    /// the SDK resolves them (environment variables, profiles, instance
    /// roles).
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of any step; see [`Pipeline::run_with`].
    pub async fn run(&self) -> Result<RunSummary> {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        self.run_with(
            Box::new(Inspector2Api::new(&aws)),
            Box::new(S3Store::new(&aws)),
        )
        .await
    }

    /// Run with injected vulnerability-API and object-store backends
    ///
    /// # Errors
    ///
    /// Returns an error when the export fails locally (artifact I/O), when
    /// the collection fails (report job, empty bucket, download), or when
    /// the upload is rejected. Remote issue-API failures do not fail the
    /// run; they degrade windows inside the returned summary.
    pub async fn run_with(
        &self,
        api: Box<dyn FindingsApi>,
        store: Box<dyn ObjectStore>,
    ) -> Result<RunSummary> {
        info!(service = %self.config.service_name, "pipeline started");

        let export = IssueExporter::new(&self.config)?.export().await?;

        let collector = FindingCollector::new(
            api,
            store,
            self.config.inspector.clone(),
            self.config.poll.clone(),
        );
        let findings = collector.collect(&self.config.inspector_artifact()).await?;

        AttachmentUploader::new(&self.config.bitbucket)?
            .upload(&export.artifact, &findings.artifact)
            .await?;

        info!(service = %self.config.service_name, "pipeline finished");
        Ok(RunSummary { export, findings })
    }
}
