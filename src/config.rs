//! Configuration types for scanpost
//!
//! Everything comes from environment variables (no CLI flags, no config
//! file), but the variables are collected eagerly into an explicit [`Config`]
//! struct: a missing, empty, or unparseable variable fails fast with an
//! error naming the variable instead of silently yielding empty values.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// Default Bitbucket API base URL
const DEFAULT_BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

/// Issue-search page size ceiling imposed by the remote API
const DEFAULT_PAGE_SIZE: u32 = 500;

/// Buffered issues are flushed to the artifact once this many accumulate
const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

/// Date-window stride in days
const DEFAULT_WINDOW_DAYS: u32 = 7;

/// HTTP timeout for the issue API and the upload
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Issue-search API configuration
#[derive(Clone, Debug)]
pub struct SonarConfig {
    /// Instance base URL; the exporter appends `/api/issues/search`
    pub base_url: String,

    /// Component key the export is scoped to
    pub project_key: String,

    /// API token; sent as the Basic-auth username with an empty password
    pub token: String,

    /// Inclusive start of the exported created-date range
    pub created_after: NaiveDate,

    /// Exclusive end of the exported created-date range.
    ///
    /// `None` means "today at collection time".
    pub created_before: Option<NaiveDate>,

    /// Date-window stride in days (default: 7)
    pub window_days: u32,

    /// Page size per request (default: 500, the remote's ceiling)
    pub page_size: u32,

    /// Buffer size that triggers a flush to the artifact (default: 10,000)
    pub flush_threshold: usize,

    /// HTTP request timeout (default: 30 seconds)
    pub timeout: Duration,
}

/// Vulnerability-report configuration
#[derive(Clone, Debug)]
pub struct InspectorConfig {
    /// Container repository name the report is scoped to
    pub repository_name: String,

    /// Image tag the report and the live listing are filtered by (default: "latest")
    pub image_tag: String,

    /// Destination bucket for the generated report
    pub bucket: String,

    /// KMS key ARN the report is encrypted under
    pub kms_key_arn: String,
}

/// Commit pull-request comment upload configuration
#[derive(Clone, Debug)]
pub struct BitbucketConfig {
    /// API base URL (default: `https://api.bitbucket.org/2.0`)
    pub api_base: String,

    /// Workspace the repository lives in
    pub workspace: String,

    /// Repository slug
    pub repo_slug: String,

    /// Commit whose pull requests receive the comment
    pub commit_id: String,

    /// Account username
    pub username: String,

    /// App password for the account
    pub app_password: String,

    /// HTTP request timeout (default: 30 seconds)
    pub timeout: Duration,
}

/// Bounded polling configuration for the report job status
///
/// Replaces the fixed pre-download sleep with a status poll: exponential
/// backoff between probes, capped per-probe delay, and a hard overall
/// deadline.
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Delay before the second probe (default: 2 seconds)
    pub initial_delay: Duration,

    /// Maximum delay between probes (default: 30 seconds)
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    pub backoff_multiplier: f64,

    /// Overall deadline; exceeding it is an error (default: 5 minutes)
    pub max_wait: Duration,

    /// Add random jitter to delays (default: true)
    pub jitter: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_wait: Duration::from_secs(300),
            jitter: true,
        }
    }
}

/// Full configuration for one pipeline run
#[derive(Clone, Debug)]
pub struct Config {
    /// Service identifier; artifact names and defaults derive from it
    pub service_name: String,

    /// Directory the two artifacts are written to (default: `.`)
    pub output_dir: PathBuf,

    /// Issue-search API settings
    pub sonar: SonarConfig,

    /// Vulnerability-report settings
    pub inspector: InspectorConfig,

    /// Upload settings
    pub bitbucket: BitbucketConfig,

    /// Report-status polling settings
    pub poll: PollConfig,
}

impl Config {
    /// Assemble the configuration from process environment variables
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the variable when a required variable
    /// is missing or empty, or when a date/number variable fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Assemble the configuration from an arbitrary variable lookup
    ///
    /// Exists so validation can be exercised without mutating process-global
    /// environment state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let service_name = env.required("SERVICE_NAME")?;
        let output_dir = PathBuf::from(env.optional("OUTPUT_DIR").unwrap_or_else(|| ".".into()));

        let created_after = env.date("EXPORT_SINCE")?;
        let created_before = env.optional_date("EXPORT_UNTIL")?;
        if let Some(until) = created_before {
            if created_after > until {
                return Err(Error::config(
                    format!("EXPORT_SINCE ({created_after}) is after EXPORT_UNTIL ({until})"),
                    "EXPORT_SINCE",
                ));
            }
        }

        let window_days = match env.optional("EXPORT_WINDOW_DAYS") {
            None => DEFAULT_WINDOW_DAYS,
            Some(raw) => {
                let days: u32 = raw.parse().map_err(|_| {
                    Error::config(
                        format!("EXPORT_WINDOW_DAYS is not a number: {raw:?}"),
                        "EXPORT_WINDOW_DAYS",
                    )
                })?;
                if days == 0 {
                    return Err(Error::config(
                        "EXPORT_WINDOW_DAYS must be at least 1",
                        "EXPORT_WINDOW_DAYS",
                    ));
                }
                days
            }
        };

        let sonar = SonarConfig {
            base_url: env.required("SONARQUBE_URL")?.trim_end_matches('/').to_string(),
            project_key: env
                .optional("SONAR_PROJECT_KEY")
                .unwrap_or_else(|| service_name.clone()),
            token: env.required("SONAR_TOKEN")?,
            created_after,
            created_before,
            window_days,
            page_size: DEFAULT_PAGE_SIZE,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            timeout: DEFAULT_HTTP_TIMEOUT,
        };

        let inspector = InspectorConfig {
            repository_name: service_name.clone(),
            image_tag: env.optional("IMAGE_TAG").unwrap_or_else(|| "latest".into()),
            bucket: env.required("BUCKET_NAME")?,
            kms_key_arn: env.required("KMS_KEY")?,
        };

        let bitbucket = BitbucketConfig {
            api_base: env
                .optional("BITBUCKET_API_URL")
                .unwrap_or_else(|| DEFAULT_BITBUCKET_API.into())
                .trim_end_matches('/')
                .to_string(),
            workspace: env.required("WORKSPACE")?,
            repo_slug: service_name.clone(),
            commit_id: env.required("COMMIT_ID")?,
            username: env.required("BB_USER")?,
            app_password: env.required("BB_APP_PASS")?,
            timeout: DEFAULT_HTTP_TIMEOUT,
        };

        Ok(Self {
            service_name,
            output_dir,
            sonar,
            inspector,
            bitbucket,
            poll: PollConfig::default(),
        })
    }

    /// Path of the issue export artifact
    #[must_use]
    pub fn sonar_artifact(&self) -> PathBuf {
        self.output_dir
            .join(format!("sonarqube-{}.csv", self.service_name))
    }

    /// Path of the downloaded vulnerability report artifact
    #[must_use]
    pub fn inspector_artifact(&self) -> PathBuf {
        self.output_dir
            .join(format!("inspector2-{}.csv", self.service_name))
    }
}

/// Environment access with uniform missing/empty/parse handling
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// A set variable, or `None`; whitespace-only counts as unset
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// A set, non-empty variable, or a config error naming the variable
    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| Error::config(format!("{key} not set in environment"), key))
    }

    /// A required `YYYY-MM-DD` variable
    fn date(&self, key: &str) -> Result<NaiveDate> {
        let raw = self.required(key)?;
        parse_date(&raw, key)
    }

    /// An optional `YYYY-MM-DD` variable
    fn optional_date(&self, key: &str) -> Result<Option<NaiveDate>> {
        self.optional(key).map(|raw| parse_date(&raw, key)).transpose()
    }
}

fn parse_date(raw: &str, key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| Error::config(format!("{key} is not a YYYY-MM-DD date: {raw:?}"), key))
}
