// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::types::Severity;
use chrono::TimeZone;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// In-memory [`FindingsApi`] serving scripted pages and statuses
///
/// Counters are shared through `Arc` so tests keep a probe handle after the
/// double is boxed into the collector.
struct FakeApi {
    pages: Vec<FindingsPage>,
    statuses: Vec<ReportJobStatus>,
    requests: Arc<Mutex<Vec<ReportRequest>>>,
    list_calls: Arc<AtomicUsize>,
    status_calls: Arc<AtomicUsize>,
}

impl FakeApi {
    fn new(pages: Vec<FindingsPage>, statuses: Vec<ReportJobStatus>) -> Self {
        Self {
            pages,
            statuses,
            requests: Arc::new(Mutex::new(Vec::new())),
            list_calls: Arc::new(AtomicUsize::new(0)),
            status_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl FindingsApi for FakeApi {
    async fn start_report(&self, request: &ReportRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok("report-1".to_string())
    }

    async fn report_status(&self, _report_id: &str) -> Result<ReportJobStatus> {
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.statuses.len() - 1);
        Ok(self.statuses[index].clone())
    }

    async fn list_findings(
        &self,
        _image_tag: &str,
        next_token: Option<&str>,
    ) -> Result<FindingsPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        // The caller must chain the cursor handed out with the previous page
        let expected_token = if call == 0 {
            None
        } else {
            self.pages[call - 1].next_token.as_deref()
        };
        assert_eq!(next_token, expected_token, "cursor not chained correctly");
        Ok(self.pages[call].clone())
    }
}

/// In-memory [`ObjectStore`] over a fixed object listing
struct FakeStore {
    objects: Vec<StoredObject>,
    downloads: Arc<Mutex<Vec<String>>>,
}

impl FakeStore {
    fn new(objects: Vec<StoredObject>) -> Self {
        Self {
            objects,
            downloads: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list_objects(&self, _bucket: &str) -> Result<Vec<StoredObject>> {
        Ok(self.objects.clone())
    }

    async fn download(&self, _bucket: &str, key: &str, dest: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(key.to_string());
        tokio::fs::write(dest, b"severity,title\nHIGH,CVE-2024-0001\n").await?;
        Ok(())
    }
}

fn fast_poll() -> PollConfig {
    PollConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        max_wait: Duration::from_secs(1),
        jitter: false,
    }
}

fn inspector_config() -> InspectorConfig {
    InspectorConfig {
        repository_name: "billing-api".to_string(),
        image_tag: "latest".to_string(),
        bucket: "scan-reports".to_string(),
        kms_key_arn: "arn:aws:kms:eu-west-1:123:key/abc".to_string(),
    }
}

fn object(key: &str, hour: u32) -> StoredObject {
    StoredObject {
        key: key.to_string(),
        last_modified: chrono::Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
    }
}

fn page(severities: &[Severity], next_token: Option<&str>) -> FindingsPage {
    FindingsPage {
        severities: severities.iter().copied().map(Some).collect(),
        next_token: next_token.map(str::to_string),
    }
}

fn collector(api: FakeApi, store: FakeStore) -> FindingCollector {
    FindingCollector::new(Box::new(api), Box::new(store), inspector_config(), fast_poll())
}

#[tokio::test]
async fn tallies_sum_across_paginated_pages() {
    use Severity::*;

    let pages = vec![
        page(&[Critical, High, High, Medium], Some("t1")),
        page(&[Low, Informational, Untriaged, Critical], Some("t2")),
        page(&[High], None),
    ];
    let api = FakeApi::new(pages, vec![ReportJobStatus::Succeeded]);
    let list_calls = api.list_calls.clone();
    let store = FakeStore::new(vec![object("report.csv", 12)]);
    let dir = TempDir::new().unwrap();

    let outcome = collector(api, store)
        .collect(&dir.path().join("inspector2-billing-api.csv"))
        .await
        .unwrap();

    let tally = outcome.tally;
    assert_eq!(tally.critical, 2);
    assert_eq!(tally.high, 3);
    assert_eq!(tally.medium, 1);
    assert_eq!(tally.low, 1);
    assert_eq!(tally.informational, 1);
    assert_eq!(tally.untriaged, 1);
    assert_eq!(tally.total(), 9, "tallies must sum to the total finding count");
    assert_eq!(list_calls.load(Ordering::SeqCst), 3, "every page is visited once");
}

#[tokio::test]
async fn findings_without_severity_count_nowhere() {
    let pages = vec![FindingsPage {
        severities: vec![Some(Severity::High), None, Some(Severity::Low), None],
        next_token: None,
    }];
    let api = FakeApi::new(pages, vec![ReportJobStatus::Succeeded]);
    let store = FakeStore::new(vec![object("report.csv", 12)]);
    let dir = TempDir::new().unwrap();

    let outcome = collector(api, store)
        .collect(&dir.path().join("out.csv"))
        .await
        .unwrap();

    assert_eq!(outcome.tally.total(), 2);
}

#[tokio::test]
async fn empty_bucket_is_an_error_and_nothing_is_downloaded() {
    let api = FakeApi::new(vec![page(&[], None)], vec![ReportJobStatus::Succeeded]);
    let store = FakeStore::new(Vec::new());
    let downloads = store.downloads.clone();
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out.csv");

    let result = collector(api, store).collect(&dest).await;

    match result {
        Err(Error::EmptyBucket { bucket }) => assert_eq!(bucket, "scan-reports"),
        other => panic!("expected EmptyBucket, got {other:?}"),
    }
    assert!(
        downloads.lock().unwrap().is_empty(),
        "no download may be attempted on an empty bucket"
    );
    assert!(!dest.exists());
}

#[tokio::test]
async fn newest_object_by_timestamp_is_downloaded() {
    let api = FakeApi::new(vec![page(&[], None)], vec![ReportJobStatus::Succeeded]);
    let store = FakeStore::new(vec![
        object("2024-02-29/report.csv", 8),
        object("2024-03-01/report.csv", 16),
        object("2024-03-01/partial.csv", 9),
    ]);
    let downloads = store.downloads.clone();
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("inspector2-billing-api.csv");

    let outcome = collector(api, store).collect(&dest).await.unwrap();

    assert_eq!(outcome.object_key, "2024-03-01/report.csv");
    assert_eq!(outcome.artifact, dest);
    assert_eq!(downloads.lock().unwrap().as_slice(), ["2024-03-01/report.csv"]);
    assert!(dest.exists(), "the selected report must land on disk");
}

#[tokio::test]
async fn report_job_is_polled_until_it_succeeds() {
    let api = FakeApi::new(
        vec![page(&[], None)],
        vec![
            ReportJobStatus::InProgress,
            ReportJobStatus::InProgress,
            ReportJobStatus::Succeeded,
        ],
    );
    let status_calls = api.status_calls.clone();
    let store = FakeStore::new(vec![object("report.csv", 12)]);
    let dir = TempDir::new().unwrap();

    let outcome = collector(api, store)
        .collect(&dir.path().join("out.csv"))
        .await
        .unwrap();

    assert_eq!(outcome.report_id, "report-1");
    assert_eq!(
        status_calls.load(Ordering::SeqCst),
        3,
        "two pending probes, then success"
    );
}

#[tokio::test]
async fn failed_report_job_surfaces_the_remote_reason() {
    let api = FakeApi::new(
        vec![page(&[], None)],
        vec![ReportJobStatus::Failed {
            reason: Some("access denied to bucket".to_string()),
        }],
    );
    let store = FakeStore::new(vec![object("report.csv", 12)]);
    let dir = TempDir::new().unwrap();

    let result = collector(api, store).collect(&dir.path().join("out.csv")).await;

    match result {
        Err(Error::ReportJob { report_id, reason }) => {
            assert_eq!(report_id, "report-1");
            assert!(reason.contains("access denied to bucket"));
        }
        other => panic!("expected ReportJob error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_report_job_is_an_error() {
    let api = FakeApi::new(vec![page(&[], None)], vec![ReportJobStatus::Cancelled]);
    let store = FakeStore::new(vec![object("report.csv", 12)]);
    let dir = TempDir::new().unwrap();

    let result = collector(api, store).collect(&dir.path().join("out.csv")).await;

    assert!(
        matches!(result, Err(Error::ReportJob { .. })),
        "cancellation must not be treated as success"
    );
}

#[tokio::test]
async fn report_request_carries_the_configured_scope() {
    let api = FakeApi::new(vec![page(&[], None)], vec![ReportJobStatus::Succeeded]);
    let requests = api.requests.clone();
    let store = FakeStore::new(vec![object("report.csv", 12)]);
    let dir = TempDir::new().unwrap();

    collector(api, store)
        .collect(&dir.path().join("out.csv"))
        .await
        .unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1, "exactly one report job is started");
    assert_eq!(
        requests[0],
        ReportRequest {
            repository_name: "billing-api".to_string(),
            image_tag: "latest".to_string(),
            bucket: "scan-reports".to_string(),
            kms_key_arn: "arn:aws:kms:eu-west-1:123:key/abc".to_string(),
        }
    );
}
