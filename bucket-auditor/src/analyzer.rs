//! 訪問分析器對賬模塊
//!
//! 從 IAM Access Analyzer 查詢已被標記為公開的 S3 存儲桶，作為探測之外的
//! 第二個獨立信號。
//!
//! # 流程
//!
//! 1. 列出分析器；失敗或沒有分析器都不是致命錯誤，返回空集合
//! 2. 只使用返回的第一個分析器（通常賬戶只有一個賬戶級分析器）
//! 3. 按 `resourceType = AWS::S3::Bucket`、`isPublic = true` 在服務端過濾，
//!    逐頁讀取直到耗盡；某頁失敗只記錄日誌並跳過，不重試
//! 4. 去掉資源 ARN 的 `arn:aws:s3:::` 前綴得到存儲桶名稱

use crate::error::{is_retryable_sdk_error, AuditorError, Result};
use crate::retry::{retry_with_backoff, with_timeout, RetryConfig};
use crate::types::{AnalyzerCoverage, AnalyzerFinding, AnalyzerHandle, BucketName};
use async_trait::async_trait;
use aws_sdk_accessanalyzer::error::DisplayErrorContext;
use aws_sdk_accessanalyzer::types::{Criterion, FindingSummary};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// S3 存儲桶的資源類型
pub const S3_BUCKET_RESOURCE_TYPE: &str = "AWS::S3::Bucket";

/// S3 存儲桶 ARN 前綴
pub const S3_BUCKET_ARN_PREFIX: &str = "arn:aws:s3:::";

/// 服務端過濾條件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingFilter {
    pub resource_type: String,
    pub is_public: bool,
}

impl FindingFilter {
    /// 公開的 S3 存儲桶
    pub fn public_buckets() -> Self {
        Self {
            resource_type: S3_BUCKET_RESOURCE_TYPE.to_string(),
            is_public: true,
        }
    }

    /// 客戶端二次檢查
    pub fn matches(&self, finding: &AnalyzerFinding) -> bool {
        finding.resource_type == self.resource_type && finding.is_public == self.is_public
    }
}

/// 分頁結果流，每個元素是一頁的發現或該頁的錯誤
pub type FindingPages<'a> = BoxStream<'a, Result<Vec<AnalyzerFinding>>>;

/// 發現來源能力
#[async_trait]
pub trait FindingSource: Send + Sync {
    /// 列出賬戶/區域內配置的分析器
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerHandle>>;

    /// 按過濾條件分頁列出發現
    ///
    /// 某頁失敗時產出 `Err`；實現可以在失敗後繼續產出後續頁，也可以結束流
    fn findings<'a>(
        &'a self,
        analyzer: &'a AnalyzerHandle,
        filter: &'a FindingFilter,
    ) -> FindingPages<'a>;
}

/// 對賬結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicBuckets {
    pub buckets: HashSet<BucketName>,
    pub coverage: AnalyzerCoverage,
    pub pages_read: usize,
    pub pages_failed: usize,
}

impl PublicBuckets {
    pub fn empty(coverage: AnalyzerCoverage) -> Self {
        Self {
            buckets: HashSet::new(),
            coverage,
            pages_read: 0,
            pages_failed: 0,
        }
    }

    pub fn contains(&self, bucket: &BucketName) -> bool {
        self.buckets.contains(bucket)
    }
}

/// 分析器對賬器
pub struct AnalyzerReconciler {
    source: Arc<dyn FindingSource>,
    call_timeout: Duration,
    retry: RetryConfig,
}

impl AnalyzerReconciler {
    pub fn new(source: Arc<dyn FindingSource>) -> Self {
        Self {
            source,
            call_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 查詢分析器認定為公開的存儲桶集合
    ///
    /// 永不返回錯誤：分析器信號是可選的，任何失敗都得到空集合或部分集合
    pub async fn list_public_buckets(&self) -> PublicBuckets {
        let analyzers = retry_with_backoff("list_analyzers", &self.retry, || {
            with_timeout(
                "list_analyzers",
                self.call_timeout,
                self.source.list_analyzers(),
            )
        })
        .await;

        let analyzers = match analyzers {
            Ok(analyzers) => analyzers,
            Err(e) => {
                warn!(error = %e, "Unable to list analyzers, continuing without analyzer signal");
                return PublicBuckets::empty(AnalyzerCoverage::Unavailable {
                    reason: e.to_string(),
                });
            }
        };

        let Some(analyzer) = analyzers.into_iter().next() else {
            info!("No analyzers found in account, continuing without analyzer signal");
            return PublicBuckets::empty(AnalyzerCoverage::NoAnalyzer);
        };

        info!(analyzer = %analyzer.name, "Querying analyzer for public bucket findings");

        let filter = FindingFilter::public_buckets();
        let mut buckets = HashSet::new();
        let mut pages_read = 0;
        let mut pages_failed = 0;

        {
            let mut pages = self.source.findings(&analyzer, &filter);

            loop {
                let page = match tokio::time::timeout(self.call_timeout, pages.next()).await {
                    Ok(Some(page)) => page,
                    Ok(None) => break,
                    Err(_) => {
                        // 分頁令牌丟失，無法越過超時的頁繼續
                        warn!(
                            page = pages_read + pages_failed + 1,
                            "Findings page timed out after {}s, stopping pagination",
                            self.call_timeout.as_secs()
                        );
                        pages_failed += 1;
                        break;
                    }
                };

                match page {
                    Ok(findings) => {
                        pages_read += 1;
                        debug!(page = pages_read + pages_failed, findings = findings.len(), "Findings page received");
                        buckets.extend(findings.iter().filter_map(|f| bucket_from_finding(f, &filter)));
                    }
                    Err(e) => {
                        pages_failed += 1;
                        warn!(
                            page = pages_read + pages_failed,
                            error = %e,
                            "Pagination error for list findings, skipping page"
                        );
                    }
                }
            }
        }

        info!(
            "Analyzer reported {} public bucket(s) ({} page(s) read, {} failed)",
            buckets.len(),
            pages_read,
            pages_failed
        );

        PublicBuckets {
            buckets,
            coverage: AnalyzerCoverage::Available {
                analyzer: analyzer.arn.clone(),
            },
            pages_read,
            pages_failed,
        }
    }
}

/// 從發現中取出存儲桶名稱
///
/// 類型不符、非公開、缺少資源或前綴不符的發現返回 `None`
pub fn bucket_from_finding(finding: &AnalyzerFinding, filter: &FindingFilter) -> Option<BucketName> {
    if !filter.matches(finding) {
        return None;
    }

    let name = finding.resource.as_deref()?.strip_prefix(S3_BUCKET_ARN_PREFIX)?;
    if name.is_empty() {
        return None;
    }

    Some(BucketName::from(name))
}

/// 基於 IAM Access Analyzer 的發現來源
#[derive(Clone)]
pub struct AccessAnalyzerSource {
    client: aws_sdk_accessanalyzer::Client,
}

impl AccessAnalyzerSource {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_accessanalyzer::Client::new(sdk_config),
        }
    }

    pub fn from_client(client: aws_sdk_accessanalyzer::Client) -> Self {
        Self { client }
    }
}

fn to_finding(summary: &FindingSummary) -> AnalyzerFinding {
    AnalyzerFinding {
        resource: summary.resource().map(str::to_string),
        resource_type: summary.resource_type().as_str().to_string(),
        is_public: summary.is_public().unwrap_or(false),
    }
}

#[async_trait]
impl FindingSource for AccessAnalyzerSource {
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerHandle>> {
        let response = self
            .client
            .list_analyzers()
            .send()
            .await
            .map_err(|e| AuditorError::Analyzer {
                message: DisplayErrorContext(&e).to_string(),
                retryable: is_retryable_sdk_error(&e),
            })?;

        Ok(response
            .analyzers()
            .iter()
            .map(|a| AnalyzerHandle {
                arn: a.arn().to_string(),
                name: a.name().to_string(),
            })
            .collect())
    }

    fn findings<'a>(
        &'a self,
        analyzer: &'a AnalyzerHandle,
        filter: &'a FindingFilter,
    ) -> FindingPages<'a> {
        let criterion = |value: String| Criterion::builder().eq(value).build();

        let paginator = self
            .client
            .list_findings()
            .analyzer_arn(&analyzer.arn)
            .filter("resourceType", criterion(filter.resource_type.clone()))
            .filter("isPublic", criterion(filter.is_public.to_string()))
            .into_paginator()
            .send();

        stream::unfold(paginator, |mut pages| async move {
            let page = pages.next().await?;
            let page = page
                .map(|output| output.findings().iter().map(to_finding).collect())
                .map_err(|e| AuditorError::Analyzer {
                    message: DisplayErrorContext(&e).to_string(),
                    retryable: is_retryable_sdk_error(&e),
                });
            Some((page, pages))
        })
        .boxed()
    }
}
