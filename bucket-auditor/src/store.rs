//! 對象存儲客戶端模塊
//!
//! 探測引擎和審計編排器通過 [`ObjectStore`] 能力接口訪問帶憑證的存儲服務：
//! - 列出賬戶內的所有存儲桶
//! - 寫入臨時探測對象
//! - 刪除臨時探測對象
//!
//! [`S3Store`] 是基於 `aws-sdk-s3` 的實現；測試中使用內存假實現。

use crate::error::{is_retryable_sdk_error, AuditorError, Result};
use crate::types::BucketName;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

/// 帶憑證的對象存儲能力
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 列出賬戶內的存儲桶（單次調用，不分頁）
    async fn list_buckets(&self) -> Result<Vec<BucketName>>;

    /// 寫入對象
    async fn put_object(&self, bucket: &BucketName, key: &str, body: &[u8]) -> Result<()>;

    /// 刪除對象
    async fn delete_object(&self, bucket: &BucketName, key: &str) -> Result<()>;
}

/// 基於 AWS S3 的對象存儲
#[derive(Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
        }
    }

    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        debug!("Listing all S3 buckets");

        let response = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| AuditorError::BucketListing {
                message: DisplayErrorContext(&e).to_string(),
                retryable: is_retryable_sdk_error(&e),
            })?;

        let buckets: Vec<BucketName> = response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(BucketName::from))
            .collect();

        info!("Found {} S3 buckets", buckets.len());
        Ok(buckets)
    }

    async fn put_object(&self, bucket: &BucketName, key: &str, body: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket.as_str())
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .map_err(|e| AuditorError::ObjectStore {
                bucket: bucket.to_string(),
                message: format!("put_object: {}", DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &BucketName, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(|e| AuditorError::ObjectStore {
                bucket: bucket.to_string(),
                message: format!("delete_object: {}", DisplayErrorContext(&e)),
            })?;

        Ok(())
    }
}
