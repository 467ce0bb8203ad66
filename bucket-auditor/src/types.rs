//! 共享數據類型定義
//!
//! 本模塊定義審計工具中各個子系統共享的數據結構

use crate::error::AuditorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 存儲桶名稱
///
/// 從賬戶的存儲桶列表中取得，列出後不可變
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketName(String);

impl BucketName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BucketName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for BucketName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// 報告模式
///
/// - `AnalyzerAssisted`: 探測結果與分析器結果做 OR 合併，只報告公開的存儲桶
/// - `ProbeOnly`: 不查詢分析器，報告每個存儲桶的探測結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    #[default]
    AnalyzerAssisted,
    ProbeOnly,
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportMode::AnalyzerAssisted => write!(f, "analyzer-assisted"),
            ReportMode::ProbeOnly => write!(f, "probe-only"),
        }
    }
}

impl FromStr for ReportMode {
    type Err = AuditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analyzer-assisted" | "analyzer" => Ok(ReportMode::AnalyzerAssisted),
            "probe-only" | "probe" => Ok(ReportMode::ProbeOnly),
            _ => Err(AuditorError::Config(format!("unknown report mode: {}", s))),
        }
    }
}

/// 輸出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 每個報告的存儲桶一行（固定寬度名稱 + 制表符 + 信號標記）
    #[default]
    Text,
    /// 完整報告的 JSON 表示
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = AuditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(AuditorError::Config(format!("unknown output format: {}", s))),
        }
    }
}

/// 匿名讀取 URL 的樣式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointStyle {
    /// `https://{bucket}.{host}/{key}`
    #[default]
    VirtualHost,
    /// `{endpoint}/{bucket}/{key}`（S3 兼容服務與本地測試）
    Path,
}

impl FromStr for EndpointStyle {
    type Err = AuditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "virtual-host" | "virtual" => Ok(EndpointStyle::VirtualHost),
            "path" => Ok(EndpointStyle::Path),
            _ => Err(AuditorError::Config(format!("unknown endpoint style: {}", s))),
        }
    }
}

/// 探測過程的結局
///
/// 說明探測判定是如何得出的，僅用於診斷和 JSON 報告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// 寫入臨時對象失敗，未進行讀取檢查
    WriteFailed(String),
    /// 匿名讀取返回的 HTTP 狀態碼
    ReadStatus(u16),
    /// 匿名讀取在傳輸層失敗（DNS、超時、連接被拒等）
    ReadFailed(String),
    /// 寫入或讀取檢查內部 panic，降級為否定判定（寫入成功時已清理）
    CheckPanicked,
    /// 因取消或運行截止時間而未探測
    Skipped,
}

/// 單個存儲桶的探測判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeVerdict {
    pub bucket: BucketName,

    /// 新寫入的對象能否在沒有憑證的情況下讀取
    pub publicly_readable: bool,

    pub outcome: ProbeOutcome,
}

impl ProbeVerdict {
    pub fn negative(bucket: BucketName, outcome: ProbeOutcome) -> Self {
        Self {
            bucket,
            publicly_readable: false,
            outcome,
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.outcome == ProbeOutcome::Skipped
    }
}

/// 訪問分析服務報告的發現
///
/// (資源標識, 資源類型, 是否公開)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerFinding {
    /// 資源 ARN，例如 `arn:aws:s3:::my-bucket`
    pub resource: Option<String>,

    /// 資源類型，例如 `AWS::S3::Bucket`
    pub resource_type: String,

    pub is_public: bool,
}

/// 分析器句柄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerHandle {
    pub arn: String,
    pub name: String,
}

/// 分析器信號在本次運行中的可用性
///
/// 用於區分「分析器認為私有」和「分析器根本沒有被諮詢」
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerCoverage {
    /// 使用了指定的分析器
    Available { analyzer: String },
    /// 賬戶/區域內沒有配置分析器
    NoAnalyzer,
    /// 列出分析器失敗
    Unavailable { reason: String },
    /// 僅探測模式下不查詢分析器
    Disabled,
}

impl AnalyzerCoverage {
    pub fn is_available(&self) -> bool {
        matches!(self, AnalyzerCoverage::Available { .. })
    }
}

/// 審計記錄
///
/// 最終輸出單元：(存儲桶, 探測判定, 分析器判定)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub bucket: BucketName,
    pub probe_public: bool,
    pub analyzer_public: bool,
    pub probe_outcome: ProbeOutcome,
}

impl AuditRecord {
    pub fn is_public(&self) -> bool {
        self.probe_public || self.analyzer_public
    }
}

/// 審計工具運行時配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    /// AWS 區域
    pub region: String,

    /// 共享憑證配置中的命名 profile（為空則使用默認憑證鏈）
    pub profile: Option<String>,

    /// 報告模式
    pub mode: ReportMode,

    /// 輸出格式
    pub output_format: OutputFormat,

    /// 同時進行的探測數量（1 = 嚴格順序）
    pub concurrency: usize,

    /// 每次外部調用的超時（秒）
    pub call_timeout_secs: u64,

    /// 整次運行的截止時間（秒），到期後不再啟動新的探測
    pub run_deadline_secs: Option<u64>,

    /// 固定的探測對象鍵（為空則每次探測生成隨機鍵）
    pub probe_key: Option<String>,

    /// 探測對象內容
    pub probe_content: String,

    /// 匿名讀取端點（為空則使用 `https://s3.{region}.amazonaws.com`）
    pub public_endpoint: Option<String>,

    /// 匿名讀取 URL 樣式
    pub endpoint_style: EndpointStyle,

    /// 列出存儲桶/分析器失敗時的最大重試次數
    pub max_retries: u32,
}

impl AuditorConfig {
    /// 匿名讀取使用的基礎 URL
    pub fn public_endpoint_url(&self) -> String {
        self.public_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            region: std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|_| "eu-west-1".to_string()),
            profile: std::env::var("AWS_PROFILE").ok(),
            mode: ReportMode::default(),
            output_format: OutputFormat::default(),
            concurrency: 8,
            call_timeout_secs: 30,
            run_deadline_secs: None,
            probe_key: None,
            probe_content: "test-please-delete-this-file".to_string(),
            public_endpoint: None,
            endpoint_style: EndpointStyle::default(),
            max_retries: 2,
        }
    }
}
