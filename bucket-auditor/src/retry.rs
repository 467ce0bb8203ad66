//! 網絡請求重試機制模組
//!
//! 實現指數退避（Exponential Backoff）策略，用於處理列出存儲桶、
//! 列出分析器時的臨時網絡故障。
//!
//! 探測對象的刪除和分析器結果分頁不經過重試：刪除必須恰好嘗試一次，
//! 失敗的分頁直接跳過。

use crate::error::{AuditorError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 重試配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大重試次數（不含首次嘗試）
    pub max_retries: u32,
    /// 初始延遲時間（毫秒）
    pub initial_delay_ms: u64,
    /// 延遲增長倍數
    pub multiplier: f64,
    /// 最大延遲時間（毫秒）
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// 指定重試次數，其餘使用默認值
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// 不重試
    pub fn none() -> Self {
        Self::with_max_retries(0)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms.min(self.max_delay_ms))
    }
}

/// 使用指數退避策略重試操作
///
/// 只有 [`AuditorError::is_transient`] 為真的錯誤才會重試，
/// 其他錯誤立即返回。
///
/// # 重試策略
///
/// 1. 初始延遲：`initial_delay_ms`
/// 2. 每次失敗後延遲乘以 `multiplier`
/// 3. 延遲上限：`max_delay_ms`
/// 4. 最大重試次數：`max_retries`
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_retries + 1;
    let mut delay = Duration::from_millis(config.initial_delay_ms);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Recovered after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts && e.is_transient() => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// 為單次調用加上超時
///
/// 超時轉換為 [`AuditorError::Timeout`]，帶上操作名稱
pub async fn with_timeout<Fut, T>(operation_name: &str, timeout: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AuditorError::Timeout {
            operation: operation_name.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}
