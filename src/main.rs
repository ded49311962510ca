//! scanpost binary entry point
//!
//! Configuration comes entirely from environment variables; see
//! [`scanpost::Config`] for the full list. The process exits non-zero on any
//! fatal pipeline error.

use scanpost::{Config, Pipeline, WindowStatus};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "scanpost run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> scanpost::Result<()> {
    let config = Config::from_env()?;
    let summary = Pipeline::new(config).run().await?;

    let export = &summary.export;
    if export.is_complete() {
        info!(
            issues = export.total_issues,
            windows = export.windows.len(),
            artifact = %export.artifact.display(),
            "issue export complete"
        );
    } else {
        warn!(
            issues = export.total_issues,
            skipped = export.degraded_windows(),
            "issue export incomplete; some windows were skipped"
        );
        for window in &export.windows {
            if window.status != WindowStatus::Complete {
                warn!(
                    from = %window.start,
                    until = %window.end,
                    issues = window.issues,
                    error = window.error.as_deref().unwrap_or("unknown"),
                    "window did not complete"
                );
            }
        }
    }

    let tally = &summary.findings.tally;
    info!(
        critical = tally.critical,
        high = tally.high,
        medium = tally.medium,
        low = tally.low,
        informational = tally.informational,
        untriaged = tally.untriaged,
        total = tally.total(),
        report = %summary.findings.object_key,
        "vulnerability findings collected"
    );

    Ok(())
}
