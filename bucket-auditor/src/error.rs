//! 審計工具統一錯誤類型定義
//!
//! 本模塊定義了審計運行過程中可能遇到的所有錯誤類型，
//! 使用 thiserror crate 提供良好的錯誤鏈和上下文信息。
//!
//! 只有設置階段的錯誤（配置、憑證、存儲桶列表）會傳播到 `main`；
//! 探測和分析器對賬的錯誤在組件邊界上被轉換為布爾判定或空集合。

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// 服務端表示「稍後再試」的錯誤碼
const RETRYABLE_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
    "RequestTimeout",
    "RequestTimeoutException",
    "InternalError",
    "InternalFailure",
    "InternalServerException",
    "ServiceUnavailable",
    "ServiceUnavailableException",
];

/// 審計工具錯誤類型
///
/// 涵蓋所有子系統的錯誤情況：
/// - 配置與憑證加載
/// - 對象存儲（列表、寫入、刪除）
/// - 匿名 HTTP 讀取檢查
/// - 訪問分析服務
#[derive(Error, Debug)]
pub enum AuditorError {
    /// 配置錯誤
    ///
    /// 當配置文件格式錯誤或參數不合法時返回此錯誤
    #[error("Configuration error: {0}")]
    Config(String),

    /// 無法列出存儲桶
    ///
    /// 這是致命錯誤：沒有存儲桶列表就無法產生任何報告
    #[error("Unable to list buckets: {message}")]
    BucketListing { message: String, retryable: bool },

    /// 對象存儲操作失敗（寫入或刪除探測對象）
    #[error("Object store error on {bucket}: {message}")]
    ObjectStore { bucket: String, message: String },

    /// 匿名讀取檢查失敗（DNS、連接、無法構造 URL 等）
    #[error("Public endpoint error: {0}")]
    PublicEndpoint(String),

    /// 訪問分析服務錯誤
    #[error("Access analyzer error: {message}")]
    Analyzer { message: String, retryable: bool },

    /// 單次調用超時
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// HTTP 請求錯誤
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// 序列化錯誤（JSON 報告輸出）
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O 錯誤
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 通用錯誤
    ///
    /// 用於包裝其他未分類的錯誤
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuditorError {
    /// 是否值得重試（僅限網絡層面的暫時性故障）
    ///
    /// 權限不足、憑證無效等永久性錯誤不重試
    pub fn is_transient(&self) -> bool {
        match self {
            AuditorError::Timeout { .. } => true,
            AuditorError::HttpRequest(e) => e.is_timeout() || e.is_connect(),
            AuditorError::BucketListing { retryable, .. }
            | AuditorError::Analyzer { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// 永久性的存儲桶列表錯誤
    pub fn bucket_listing(message: impl Into<String>) -> Self {
        AuditorError::BucketListing {
            message: message.into(),
            retryable: false,
        }
    }

    /// 永久性的分析器錯誤
    pub fn analyzer(message: impl Into<String>) -> Self {
        AuditorError::Analyzer {
            message: message.into(),
            retryable: false,
        }
    }
}

/// 判斷 AWS SDK 錯誤是否為暫時性故障
///
/// 超時、連接失敗、響應無法解析，以及限流/服務端內部錯誤碼視為可重試；
/// `AccessDenied`、`InvalidAccessKeyId` 等其餘服務錯誤為永久性錯誤。
pub fn is_retryable_sdk_error<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        _ => err
            .as_service_error()
            .and_then(|service_err| service_err.code())
            .map_or(false, is_retryable_code),
    }
}

fn is_retryable_code(code: &str) -> bool {
    RETRYABLE_ERROR_CODES.contains(&code)
}

/// Result 類型別名
///
/// 使用統一的錯誤類型簡化函數簽名
pub type Result<T> = std::result::Result<T, AuditorError>;

/// 從 JSON 錯誤轉換
impl From<serde_json::Error> for AuditorError {
    fn from(err: serde_json::Error) -> Self {
        AuditorError::Serialization(err.to_string())
    }
}

/// 從 URL 解析錯誤轉換
impl From<url::ParseError> for AuditorError {
    fn from(err: url::ParseError) -> Self {
        AuditorError::PublicEndpoint(format!("invalid URL: {}", err))
    }
}
