//! 核心審計編排邏輯
//!
//! 列出賬戶內的存儲桶 → 查詢一次分析器 → 逐桶探測 → 合併兩個信號。
//!
//! 列出存儲桶失敗是唯一的致命錯誤；單個存儲桶的探測失敗只影響該存儲桶，
//! 分析器不可用只會讓分析器信號為空。

use crate::analyzer::{AnalyzerReconciler, FindingSource, PublicBuckets};
use crate::error::Result;
use crate::probe::ProbeEngine;
use crate::public_endpoint::PublicReader;
use crate::report::AuditReport;
use crate::retry::{retry_with_backoff, with_timeout, RetryConfig};
use crate::store::ObjectStore;
use crate::types::{
    AnalyzerCoverage, AuditRecord, AuditorConfig, BucketName, ProbeOutcome, ProbeVerdict,
    ReportMode,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 運行控制：取消標記與整體截止時間
///
/// 觸發後不再啟動新的探測，已經開始的探測會完成（包括清理）
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, after: Duration) -> Self {
        self.deadline = Some(Instant::now() + after);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.deadline_passed()
    }
}

/// 審計編排器
pub struct Auditor {
    store: Arc<dyn ObjectStore>,
    probe: ProbeEngine,
    reconciler: AnalyzerReconciler,
    mode: ReportMode,
    region: String,
    concurrency: usize,
    call_timeout: Duration,
    retry: RetryConfig,
}

impl Auditor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        reader: Arc<dyn PublicReader>,
        source: Arc<dyn FindingSource>,
        config: &AuditorConfig,
    ) -> Self {
        let call_timeout = Duration::from_secs(config.call_timeout_secs);
        let retry = RetryConfig::with_max_retries(config.max_retries);

        let probe = ProbeEngine::from_config(store.clone(), reader, config);
        let reconciler = AnalyzerReconciler::new(source)
            .with_call_timeout(call_timeout)
            .with_retry(retry.clone());

        info!(
            "Auditor ready: region={}, mode={}, concurrency={}",
            config.region, config.mode, config.concurrency
        );

        Self {
            store,
            probe,
            reconciler,
            mode: config.mode,
            region: config.region.clone(),
            concurrency: config.concurrency.max(1),
            call_timeout,
            retry,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.reconciler = self.reconciler.with_retry(retry.clone());
        self.retry = retry;
        self
    }

    /// 執行一次完整審計
    ///
    /// 只有列出存儲桶失敗時返回錯誤，此時不產生任何報告
    pub async fn run(&self, control: &RunControl) -> Result<AuditReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        let buckets = self.list_buckets().await?;
        info!("Auditing {} bucket(s) in {}", buckets.len(), self.region);

        let analyzer = match self.mode {
            ReportMode::AnalyzerAssisted => self.reconciler.list_public_buckets().await,
            ReportMode::ProbeOnly => PublicBuckets::empty(AnalyzerCoverage::Disabled),
        };

        let verdicts = self.probe_all(&buckets, control).await;
        let skipped = verdicts.iter().filter(|v| v.was_skipped()).count();
        if skipped > 0 {
            warn!("Run stopped early: {} bucket(s) were not probed", skipped);
        }

        let records = merge_signals(&verdicts, &analyzer, self.mode);
        for record in &records {
            if record.is_public() {
                info!(
                    bucket = %record.bucket,
                    probe = record.probe_public,
                    analyzer = record.analyzer_public,
                    "Public bucket"
                );
            }
        }

        info!(
            "Audit completed in {:.2}s: {} bucket(s) reported",
            start_time.elapsed().as_secs_f64(),
            records.len()
        );

        Ok(AuditReport {
            region: self.region.clone(),
            mode: self.mode,
            started_at,
            finished_at: Utc::now(),
            buckets_listed: buckets.len(),
            buckets_probed: verdicts.len() - skipped,
            buckets_skipped: skipped,
            cancelled: skipped > 0,
            analyzer: analyzer.coverage,
            analyzer_pages_failed: analyzer.pages_failed,
            records,
        })
    }

    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        retry_with_backoff("list_buckets", &self.retry, || {
            with_timeout("list_buckets", self.call_timeout, self.store.list_buckets())
        })
        .await
    }

    /// 在有界並發下探測所有存儲桶，結果順序與列表順序一致
    async fn probe_all(&self, buckets: &[BucketName], control: &RunControl) -> Vec<ProbeVerdict> {
        stream::iter(buckets.iter().cloned())
            .map(|bucket| async move {
                if control.should_stop() {
                    debug!(bucket = %bucket, "Skipping probe, run is stopping");
                    return ProbeVerdict::negative(bucket, ProbeOutcome::Skipped);
                }
                self.probe.probe(&bucket).await
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// 合併探測判定與分析器結果
///
/// - `AnalyzerAssisted`: 探測或分析器任一認定公開即報告（邏輯 OR）
/// - `ProbeOnly`: 報告每個已探測存儲桶的探測結果
pub fn merge_signals(
    verdicts: &[ProbeVerdict],
    analyzer: &PublicBuckets,
    mode: ReportMode,
) -> Vec<AuditRecord> {
    verdicts
        .iter()
        .filter_map(|verdict| {
            let record = AuditRecord {
                bucket: verdict.bucket.clone(),
                probe_public: verdict.publicly_readable,
                analyzer_public: mode == ReportMode::AnalyzerAssisted
                    && analyzer.contains(&verdict.bucket),
                probe_outcome: verdict.outcome.clone(),
            };

            match mode {
                ReportMode::AnalyzerAssisted => record.is_public().then_some(record),
                ReportMode::ProbeOnly => (!verdict.was_skipped()).then_some(record),
            }
        })
        .collect()
}
