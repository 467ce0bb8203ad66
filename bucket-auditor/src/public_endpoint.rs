//! 匿名讀取客戶端模塊
//!
//! 對探測對象的公開 URL 發送不帶任何憑證的 `HEAD` 請求。
//!
//! 這裡刻意不使用 SDK 的 `HeadObject`：SDK 客戶端會自動附加環境中的憑證，
//! 而我們要驗證的是「沒有憑證的人能否讀取」。[`HttpPublicReader`] 使用獨立的
//! `reqwest::Client`，不設置任何默認請求頭，也不做請求簽名。
//!
//! # URL 樣式
//!
//! - 虛擬主機：`https://{bucket}.s3.{region}.amazonaws.com/{key}`
//! - 路徑：`{endpoint}/{bucket}/{key}`
//!
//! 存儲桶名稱和鍵通過 `url` crate 的主機/路徑段 API 寫入，
//! 需要轉義的字符會被正確編碼；無法表示為主機名的存儲桶返回錯誤。

use crate::error::{AuditorError, Result};
use crate::types::{BucketName, EndpointStyle};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// 無憑證讀取能力
#[async_trait]
pub trait PublicReader: Send + Sync {
    /// 對 `bucket/key` 發送匿名 `HEAD`，返回 HTTP 狀態碼
    ///
    /// 傳輸層錯誤（DNS、連接、超時）返回 `Err`
    async fn head(&self, bucket: &BucketName, key: &str) -> Result<u16>;
}

/// 基於 reqwest 的匿名讀取客戶端
pub struct HttpPublicReader {
    /// 不攜帶憑證的 HTTP 客戶端
    http_client: Client,

    /// 端點基礎 URL，例如 `https://s3.eu-west-1.amazonaws.com`
    base_url: Url,

    style: EndpointStyle,

    timeout: Duration,
}

impl HttpPublicReader {
    /// 創建匿名讀取客戶端
    ///
    /// # 示例
    /// ```no_run
    /// use bucket_auditor::public_endpoint::HttpPublicReader;
    /// use bucket_auditor::types::EndpointStyle;
    ///
    /// let reader = HttpPublicReader::new(
    ///     "https://s3.eu-west-1.amazonaws.com",
    ///     EndpointStyle::VirtualHost,
    ///     30,
    /// ).unwrap();
    /// ```
    pub fn new(base_url: &str, style: EndpointStyle, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        if style == EndpointStyle::VirtualHost && base_url.host_str().is_none() {
            return Err(AuditorError::Config(format!(
                "Virtual-host endpoint requires a host: {}",
                base_url
            )));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        debug!(
            "Created HttpPublicReader for {} ({:?}, timeout: {}s)",
            base_url, style, timeout_secs
        );

        Ok(Self {
            http_client,
            base_url,
            style,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// 構造對象的公開 URL
    pub fn object_url(&self, bucket: &BucketName, key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();

        if self.style == EndpointStyle::VirtualHost {
            let host = self.base_url.host_str().ok_or_else(|| {
                AuditorError::PublicEndpoint(format!("endpoint has no host: {}", self.base_url))
            })?;
            url.set_host(Some(&format!("{}.{}", bucket, host)))
                .map_err(|e| {
                    AuditorError::PublicEndpoint(format!(
                        "bucket {} is not a valid host label: {}",
                        bucket, e
                    ))
                })?;
        }

        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                AuditorError::PublicEndpoint(format!("endpoint cannot be a base: {}", self.base_url))
            })?;
            segments.pop_if_empty();
            if self.style == EndpointStyle::Path {
                segments.push(bucket.as_str());
            }
            segments.push(key);
        }

        Ok(url)
    }
}

#[async_trait]
impl PublicReader for HttpPublicReader {
    async fn head(&self, bucket: &BucketName, key: &str) -> Result<u16> {
        let url = self.object_url(bucket, key)?;

        debug!(bucket = %bucket, url = %url, "Anonymous HEAD");

        let response = self.http_client.head(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                AuditorError::PublicEndpoint(format!(
                    "{}: request timeout after {}s",
                    url,
                    self.timeout.as_secs()
                ))
            } else if e.is_connect() {
                AuditorError::PublicEndpoint(format!("{}: connection failed - {}", url, e))
            } else {
                AuditorError::PublicEndpoint(format!("{}: {}", url, e))
            }
        })?;

        Ok(response.status().as_u16())
    }
}
