use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use store::{CheckpointStore, SinkOptions, TabularSink};
use tracing::{debug, error, info, warn};

use crate::error::ScrapeError;
use crate::source::{ItemRef, PortalSource};

const MAX_FAILURE_SAMPLES: usize = 10;

/// What to do when a board exposes no readable page count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationFallback {
    /// Stop and surface the failure to the operator.
    #[default]
    Escalate,
    /// Walk page 1 only.
    AssumeSinglePage,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub checkpoint_path: PathBuf,
    pub sink_path: PathBuf,
    pub download_dir: PathBuf,
    pub sink_options: SinkOptions,
    pub pagination_fallback: PaginationFallback,
}

impl PipelineConfig {
    /// Conventional layout under one data directory: sink and checkpoint
    /// named after the source, downloads in a per-source subdirectory.
    pub fn new(data_dir: impl Into<PathBuf>, source_name: &str) -> Self {
        let data_dir = data_dir.into();
        Self {
            checkpoint_path: data_dir.join(format!("{source_name}.checkpoint.json")),
            sink_path: data_dir.join(format!("{source_name}.csv")),
            download_dir: data_dir.join("downloads").join(source_name),
            sink_options: SinkOptions::default(),
            pagination_fallback: PaginationFallback::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureBucket {
    pub count: usize,
    /// At most `MAX_FAILURE_SAMPLES` item keys, for the run summary.
    pub sample_keys: Vec<String>,
}

/// Outcome of one acquisition run. Failures are grouped by error kind so
/// the summary stays readable even when a portal misbehaves at scale.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: String,
    pub pages_visited: u32,
    pub items_processed: usize,
    pub items_skipped: usize,
    pub attachments_saved: usize,
    pub duplicates_removed: usize,
    pub cancelled: bool,
    pub failures: BTreeMap<String, FailureBucket>,
}

impl RunReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            pages_visited: 0,
            items_processed: 0,
            items_skipped: 0,
            attachments_saved: 0,
            duplicates_removed: 0,
            cancelled: false,
            failures: BTreeMap::new(),
        }
    }

    fn record_failure(&mut self, kind: &str, key: &str) {
        let bucket = self.failures.entry(kind.to_string()).or_default();
        bucket.count += 1;
        if bucket.sample_keys.len() < MAX_FAILURE_SAMPLES {
            bucket.sample_keys.push(key.to_string());
        }
    }

    pub fn total_failures(&self) -> usize {
        self.failures.values().map(|b| b.count).sum()
    }
}

/// Drives one `PortalSource` from where the last run stopped to the last
/// page, persisting enough state after every item that a crash at any
/// point resumes without losing or re-fetching finished work.
///
/// Transient failures are counted and skipped; structural ones abort the
/// run after buffered rows and the checkpoint hit disk.
pub struct AcquisitionPipeline<S: PortalSource> {
    source: S,
    checkpoint: CheckpointStore,
    sink: TabularSink,
    download_dir: PathBuf,
    fallback: PaginationFallback,
    cancel: Arc<AtomicBool>,
}

impl<S: PortalSource> AcquisitionPipeline<S> {
    pub fn new(source: S, config: &PipelineConfig) -> Result<Self, ScrapeError> {
        std::fs::create_dir_all(&config.download_dir)?;
        if let Some(parent) = config.checkpoint_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let checkpoint = CheckpointStore::open(&config.checkpoint_path, source.name())?;
        let sink = TabularSink::create(
            &config.sink_path,
            source.columns(),
            config.sink_options.clone(),
        )?;
        Ok(Self {
            source,
            checkpoint,
            sink,
            download_dir: config.download_dir.clone(),
            fallback: config.pagination_fallback,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared flag for signal handlers. Once set, the run winds down at the
    /// next item or page boundary and on-disk state stays resumable.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub async fn run(mut self) -> Result<RunReport, ScrapeError> {
        let mut report = RunReport::new(self.source.name());

        let last_page = match self.source.discover_last_page().await {
            Ok(n) => n,
            Err(e @ ScrapeError::Pagination { .. }) => match self.fallback {
                PaginationFallback::AssumeSinglePage => {
                    warn!(error = %e, "page count undiscoverable, walking page 1 only");
                    1
                }
                PaginationFallback::Escalate => {
                    self.shutdown().await;
                    return Err(e);
                }
            },
            Err(e) => {
                self.shutdown().await;
                return Err(e);
            }
        };

        let start_page = self.checkpoint.last_page() + 1;
        info!(
            source = %report.source,
            start_page,
            last_page,
            already_processed = self.checkpoint.processed_count(),
            "acquisition started"
        );

        'pages: for page in start_page..=last_page {
            if self.cancel.load(Ordering::SeqCst) {
                report.cancelled = true;
                break 'pages;
            }

            let items = match self.source.open_page(page).await {
                Ok(items) => items,
                Err(e) if e.is_fatal() => {
                    error!(page, error = %e, "aborting run");
                    self.shutdown().await;
                    return Err(e);
                }
                Err(e) => {
                    warn!(page, error = %e, "page navigation failed, moving on");
                    report.record_failure(e.kind_label(), &format!("page {page}"));
                    continue;
                }
            };
            report.pages_visited += 1;

            for item in &items {
                if self.cancel.load(Ordering::SeqCst) {
                    report.cancelled = true;
                    break 'pages;
                }
                if self.checkpoint.is_processed(&item.key) {
                    report.items_skipped += 1;
                    continue;
                }
                match self.process_item(item, &mut report).await {
                    Ok(()) => report.items_processed += 1,
                    Err(e) if e.is_fatal() => {
                        error!(key = %item.key, error = %e, "aborting run");
                        self.shutdown().await;
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(key = %item.key, error = %e, "item failed, moving on");
                        report.record_failure(e.kind_label(), &item.key);
                    }
                }
            }

            // A page counts as done only once every item on it had its turn.
            self.checkpoint.set_last_page(page);
            if let Err(e) = self.checkpoint.flush() {
                self.shutdown().await;
                return Err(e.into());
            }
        }

        if let Err(e) = self.sink.flush() {
            self.source.close().await.ok();
            return Err(e.into());
        }
        if !report.cancelled {
            let primary_key = self.source.primary_key().to_string();
            match self.sink.dedupe_by(&primary_key) {
                Ok(removed) => report.duplicates_removed = removed,
                Err(e) => {
                    self.source.close().await.ok();
                    return Err(e.into());
                }
            }
        }
        if let Err(e) = self.checkpoint.flush() {
            self.source.close().await.ok();
            return Err(e.into());
        }
        if let Err(e) = self.source.close().await {
            warn!(error = %e, "portal close failed");
        }

        info!(
            source = %report.source,
            pages = report.pages_visited,
            processed = report.items_processed,
            skipped = report.items_skipped,
            attachments = report.attachments_saved,
            duplicates = report.duplicates_removed,
            failures = report.total_failures(),
            cancelled = report.cancelled,
            "acquisition finished"
        );
        Ok(report)
    }

    /// One item end to end: detail row into the sink, attachments onto
    /// disk, then the checkpoint. Crashing between the append and the
    /// checkpoint flush can duplicate the row; the final dedupe absorbs it.
    async fn process_item(
        &mut self,
        item: &ItemRef,
        report: &mut RunReport,
    ) -> Result<(), ScrapeError> {
        let detail = self.source.extract_detail(item).await?;
        self.sink.append(detail.row)?;

        for attachment in &detail.attachments {
            match self.source.download(attachment, &self.download_dir).await {
                Ok(path) => {
                    report.attachments_saved += 1;
                    debug!(key = %item.key, file = %path.display(), "attachment saved");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        key = %item.key,
                        label = %attachment.label,
                        error = %e,
                        "attachment failed"
                    );
                    report.record_failure(e.kind_label(), &item.key);
                }
            }
        }

        self.checkpoint.mark_processed(&item.key);
        self.checkpoint.flush()?;
        Ok(())
    }

    /// Best-effort persistence before an abort. Errors here are logged,
    /// not returned: the caller already holds the one that matters.
    async fn shutdown(&mut self) {
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "sink flush failed during shutdown");
        }
        if let Err(e) = self.checkpoint.flush() {
            warn!(error = %e, "checkpoint flush failed during shutdown");
        }
        if let Err(e) = self.source.close().await {
            warn!(error = %e, "portal close failed during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{AttachmentRef, ItemDetail};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeState {
        extracted: Vec<String>,
        downloads: usize,
        closed: bool,
    }

    struct FakeSource {
        pages: Vec<Vec<&'static str>>,
        fail_extract_keys: Vec<&'static str>,
        discover_fails: bool,
        attach_per_item: usize,
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeSource {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                fail_extract_keys: Vec::new(),
                discover_fails: false,
                attach_per_item: 0,
                state: Arc::new(Mutex::new(FakeState::default())),
            }
        }
    }

    #[async_trait]
    impl PortalSource for FakeSource {
        fn name(&self) -> &str {
            "fake-board"
        }

        fn columns(&self) -> Vec<String> {
            vec!["cert_no".to_string(), "title".to_string()]
        }

        fn primary_key(&self) -> &str {
            "cert_no"
        }

        async fn discover_last_page(&mut self) -> Result<u32, ScrapeError> {
            if self.discover_fails {
                return Err(ScrapeError::Pagination {
                    reason: "no pagination control".to_string(),
                });
            }
            Ok(self.pages.len() as u32)
        }

        async fn open_page(&mut self, page: u32) -> Result<Vec<ItemRef>, ScrapeError> {
            let keys = self
                .pages
                .get((page - 1) as usize)
                .cloned()
                .unwrap_or_default();
            Ok(keys.into_iter().map(ItemRef::new).collect())
        }

        async fn extract_detail(&mut self, item: &ItemRef) -> Result<ItemDetail, ScrapeError> {
            if self.fail_extract_keys.contains(&item.key.as_str()) {
                return Err(ScrapeError::Detail {
                    reason: "field missing".to_string(),
                });
            }
            self.state.lock().unwrap().extracted.push(item.key.clone());
            Ok(ItemDetail {
                row: vec![item.key.clone(), format!("notice {}", item.key)],
                attachments: (0..self.attach_per_item)
                    .map(|i| AttachmentRef {
                        label: format!("file{i}.hwp"),
                        href: Some(format!("/attach/file{i}.hwp")),
                        onclick: None,
                    })
                    .collect(),
            })
        }

        async fn download(
            &mut self,
            _attachment: &AttachmentRef,
            dest_dir: &Path,
        ) -> Result<PathBuf, ScrapeError> {
            self.state.lock().unwrap().downloads += 1;
            Ok(dest_dir.join("file.hwp"))
        }

        async fn close(&mut self) -> Result<(), ScrapeError> {
            self.state.lock().unwrap().closed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_full_run_writes_rows_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new(vec![vec!["1", "2"], vec!["3"]]);
        source.attach_per_item = 1;
        let state = Arc::clone(&source.state);
        let config = PipelineConfig::new(dir.path(), "fake-board");

        let pipeline = AcquisitionPipeline::new(source, &config).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.pages_visited, 2);
        assert_eq!(report.items_processed, 3);
        assert_eq!(report.attachments_saved, 3);
        assert!(!report.cancelled);
        assert!(report.failures.is_empty());
        assert!(state.lock().unwrap().closed);

        let csv = std::fs::read_to_string(&config.sink_path).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_resume_processes_only_remaining_items() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), "fake-board");
        {
            let mut checkpoint =
                CheckpointStore::open(&config.checkpoint_path, "fake-board").unwrap();
            checkpoint.set_last_page(1);
            checkpoint.mark_processed("1");
            checkpoint.mark_processed("2");
            checkpoint.mark_processed("3");
            checkpoint.flush().unwrap();
        }

        let source = FakeSource::new(vec![vec!["1", "2"], vec!["3", "4"], vec!["5", "6"]]);
        let state = Arc::clone(&source.state);
        let pipeline = AcquisitionPipeline::new(source, &config).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.items_processed, 3);
        assert_eq!(report.items_skipped, 1);
        assert_eq!(state.lock().unwrap().extracted, vec!["4", "5", "6"]);

        let reopened = CheckpointStore::open(&config.checkpoint_path, "fake-board").unwrap();
        assert_eq!(reopened.last_page(), 3);
        assert!(reopened.is_processed("6"));
    }

    #[tokio::test]
    async fn test_empty_source_completes_with_header_only_sink() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), "fake-board");
        let pipeline = AcquisitionPipeline::new(FakeSource::new(vec![]), &config).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.pages_visited, 0);
        assert_eq!(report.items_processed, 0);
        let csv = std::fs::read_to_string(&config.sink_path).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.contains("cert_no"));
    }

    #[tokio::test]
    async fn test_transient_item_failure_is_recorded_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), "fake-board");
        let mut source = FakeSource::new(vec![vec!["1", "2", "3"]]);
        source.fail_extract_keys = vec!["2"];
        let pipeline = AcquisitionPipeline::new(source, &config).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.items_processed, 2);
        let bucket = report.failures.get("detail").unwrap();
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.sample_keys, vec!["2"]);

        let reopened = CheckpointStore::open(&config.checkpoint_path, "fake-board").unwrap();
        assert!(!reopened.is_processed("2"));
        assert!(reopened.is_processed("3"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_any_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), "fake-board");
        let source = FakeSource::new(vec![vec!["1"], vec!["2"]]);
        let state = Arc::clone(&source.state);
        let pipeline = AcquisitionPipeline::new(source, &config).unwrap();
        pipeline.cancel_flag().store(true, Ordering::SeqCst);
        let report = pipeline.run().await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.items_processed, 0);
        assert_eq!(report.duplicates_removed, 0);
        assert!(state.lock().unwrap().closed);
    }

    #[tokio::test]
    async fn test_pagination_fallback_assumes_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::new(dir.path(), "fake-board");
        config.pagination_fallback = PaginationFallback::AssumeSinglePage;
        let mut source = FakeSource::new(vec![vec!["1"], vec!["2"]]);
        source.discover_fails = true;
        let pipeline = AcquisitionPipeline::new(source, &config).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.pages_visited, 1);
        assert_eq!(report.items_processed, 1);
    }

    #[tokio::test]
    async fn test_pagination_failure_escalates_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), "fake-board");
        let mut source = FakeSource::new(vec![vec!["1"]]);
        source.discover_fails = true;
        let state = Arc::clone(&source.state);
        let pipeline = AcquisitionPipeline::new(source, &config).unwrap();
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, ScrapeError::Pagination { .. }));
        assert!(state.lock().unwrap().closed);
    }

    #[tokio::test]
    async fn test_rows_left_by_an_interrupted_run_are_deduped() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path(), "fake-board");
        {
            let mut sink = TabularSink::create(
                &config.sink_path,
                vec!["cert_no".to_string(), "title".to_string()],
                SinkOptions::default(),
            )
            .unwrap();
            sink.append(vec!["7".to_string(), "stale row".to_string()])
                .unwrap();
            sink.close().unwrap();
        }

        let source = FakeSource::new(vec![vec!["7"]]);
        let pipeline = AcquisitionPipeline::new(source, &config).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.duplicates_removed, 1);
        let csv = std::fs::read_to_string(&config.sink_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("stale row"));
    }
}
