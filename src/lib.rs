//! # scanpost
//!
//! Exports static-analysis findings and posts them to a pull request:
//! SonarQube issues are paginated into a local tabular artifact, an
//! Inspector2 findings report is generated and retrieved from object
//! storage, and both files are attached to the Bitbucket pull requests of a
//! commit in a single multipart comment.
//!
//! ## Design Philosophy
//!
//! - **Sequential by construction** - three steps run in fixed order; each
//!   step's contract with the next is an artifact file on local disk
//! - **Explicit configuration** - everything comes from environment
//!   variables, validated eagerly into a [`Config`] with named errors
//! - **Degrade, don't drop silently** - a failing export window is recorded
//!   in the run summary instead of only in a log line
//! - **Cloud behind seams** - the vulnerability API and object store are
//!   traits, so the workflow is testable without credentials
//!
//! ## Quick Start
//!
//! ```no_run
//! use scanpost::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let summary = Pipeline::new(config).run().await?;
//!
//!     println!(
//!         "exported {} issues across {} windows",
//!         summary.export.total_issues,
//!         summary.export.windows.len()
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Finding collection (report job, severity tally, report retrieval)
pub mod collector;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Issue export over bounded date windows
pub mod exporter;
/// Sequential pipeline orchestration
pub mod pipeline;
/// Bounded status polling with exponential backoff
pub mod poll;
/// Core types and run reports
pub mod types;
/// Pull-request attachment upload
pub mod uploader;

// Re-export commonly used types
pub use collector::{FindingCollector, FindingsApi, ObjectStore, ReportRequest};
pub use config::{BitbucketConfig, Config, InspectorConfig, PollConfig, SonarConfig};
pub use error::{Error, Result};
pub use exporter::IssueExporter;
pub use pipeline::Pipeline;
pub use types::{
    CollectorOutcome, ExportReport, FindingsPage, IssueRecord, ReportJobStatus, RunSummary,
    Severity, SeverityTally, StoredObject, WindowReport, WindowStatus,
};
pub use uploader::AttachmentUploader;
