//! AWS-backed adapters for the collector seams
//!
//! [`Inspector2Api`] drives Amazon Inspector2 report jobs and the live
//! findings listing; [`S3Store`] lists and downloads objects from the report
//! destination bucket. SDK failures are flattened into [`Error::Storage`]
//! with the full error chain rendered, since callers treat the cloud side as
//! one opaque collaborator.

use super::{FindingsApi, ObjectStore, ReportRequest};
use crate::error::{Error, Result};
use crate::types::{FindingsPage, ReportJobStatus, Severity, StoredObject};
use async_trait::async_trait;
use aws_sdk_inspector2::types::{
    Destination, ExternalReportStatus, FilterCriteria, ReportFormat, StringComparison,
    StringFilter,
};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Finding status the report is filtered to
const ACTIVE_STATUS: &str = "ACTIVE";

/// Inspector2 adapter for [`FindingsApi`]
pub struct Inspector2Api {
    client: aws_sdk_inspector2::Client,
}

impl Inspector2Api {
    /// Build the adapter from shared SDK configuration
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_inspector2::Client::new(config),
        }
    }
}

#[async_trait]
impl FindingsApi for Inspector2Api {
    async fn start_report(&self, request: &ReportRequest) -> Result<String> {
        let criteria = FilterCriteria::builder()
            .finding_status(eq_filter(ACTIVE_STATUS)?)
            .ecr_image_tags(eq_filter(&request.image_tag)?)
            .ecr_image_repository_name(eq_filter(&request.repository_name)?)
            .build();

        let destination = Destination::builder()
            .bucket_name(&request.bucket)
            .kms_key_arn(&request.kms_key_arn)
            .build()
            .map_err(|e| Error::Storage(format!("invalid report destination: {e}")))?;

        let output = self
            .client
            .create_findings_report()
            .filter_criteria(criteria)
            .report_format(ReportFormat::Csv)
            .s3_destination(destination)
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "create findings report: {}",
                    aws_sdk_inspector2::error::DisplayErrorContext(e)
                ))
            })?;

        output
            .report_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Storage("create findings report returned no report id".into()))
    }

    async fn report_status(&self, report_id: &str) -> Result<ReportJobStatus> {
        let output = self
            .client
            .get_findings_report_status()
            .report_id(report_id)
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "get report status: {}",
                    aws_sdk_inspector2::error::DisplayErrorContext(e)
                ))
            })?;

        match output.status() {
            Some(ExternalReportStatus::Succeeded) => Ok(ReportJobStatus::Succeeded),
            Some(ExternalReportStatus::InProgress) => Ok(ReportJobStatus::InProgress),
            Some(ExternalReportStatus::Cancelled) => Ok(ReportJobStatus::Cancelled),
            Some(ExternalReportStatus::Failed) => Ok(ReportJobStatus::Failed {
                reason: output.error_message().map(str::to_string),
            }),
            Some(other) => Err(Error::Storage(format!(
                "unexpected report status: {other:?}"
            ))),
            None => Err(Error::Storage(
                "report status response carried no status".into(),
            )),
        }
    }

    async fn list_findings(
        &self,
        image_tag: &str,
        next_token: Option<&str>,
    ) -> Result<FindingsPage> {
        let criteria = FilterCriteria::builder()
            .ecr_image_tags(eq_filter(image_tag)?)
            .build();

        let mut call = self.client.list_findings().filter_criteria(criteria);
        if let Some(token) = next_token {
            call = call.next_token(token);
        }
        let output = call.send().await.map_err(|e| {
            Error::Storage(format!(
                "list findings: {}",
                aws_sdk_inspector2::error::DisplayErrorContext(e)
            ))
        })?;

        Ok(FindingsPage {
            severities: output
                .findings()
                .iter()
                .map(|finding| severity_from_aws(finding.severity()))
                .collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}

/// S3 adapter for [`ObjectStore`]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Build the adapter from shared SDK configuration
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut call = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = &continuation {
                call = call.continuation_token(token);
            }
            let output = call.send().await.map_err(|e| {
                Error::Storage(format!(
                    "list objects in {bucket}: {}",
                    aws_sdk_s3::error::DisplayErrorContext(e)
                ))
            })?;

            for object in output.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified()) else {
                    continue;
                };
                let Some(last_modified) =
                    DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
                else {
                    continue;
                };
                objects.push(StoredObject {
                    key: key.to_string(),
                    last_modified,
                });
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "get object {bucket}/{key}: {}",
                    aws_sdk_s3::error::DisplayErrorContext(e)
                ))
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Storage(format!("read object body {bucket}/{key}: {e}")))?
            .into_bytes();
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

/// An EQUALS string filter for the given value
fn eq_filter(value: &str) -> Result<StringFilter> {
    StringFilter::builder()
        .comparison(StringComparison::Equals)
        .value(value)
        .build()
        .map_err(|e| Error::Storage(format!("invalid filter value {value:?}: {e}")))
}

/// Map the SDK severity onto the local enum; unknown values count nowhere
fn severity_from_aws(severity: &aws_sdk_inspector2::types::Severity) -> Option<Severity> {
    use aws_sdk_inspector2::types::Severity as Aws;

    match severity {
        Aws::Critical => Some(Severity::Critical),
        Aws::High => Some(Severity::High),
        Aws::Medium => Some(Severity::Medium),
        Aws::Low => Some(Severity::Low),
        Aws::Informational => Some(Severity::Informational),
        Aws::Untriaged => Some(Severity::Untriaged),
        _ => None,
    }
}
