//! 探測引擎
//!
//! 對單個存儲桶執行「寫入 → 匿名讀取 → 刪除」三步探測，得出布爾判定：
//! 新寫入的對象能否在沒有憑證的情況下被讀取。
//!
//! # 協議
//!
//! 1. 用帶憑證的客戶端寫入固定內容的臨時對象
//! 2. 寫入失敗 → 判定為非公開，直接結束（沒有已知對象就無從驗證）
//! 3. 寫入成功 → 無論後續如何，刪除都會恰好執行一次
//! 4. 用無憑證客戶端 `HEAD` 對象公開 URL，HTTP 200 即為公開
//! 5. 清理完成後返回判定；清理失敗只記錄日誌
//!
//! 寫入、讀取、刪除三步都在 `catch_unwind` 之內執行，任何一步 panic
//! 都只讓當前存儲桶得到否定判定，不會中斷整次審計。
//!
//! 這是比 AWS 定義更窄的「公開」：只能發現策略允許匿名讀取新對象的存儲桶，
//! 因此需要訪問分析器作為第二個信號（見 [`crate::analyzer`]）。

use crate::public_endpoint::PublicReader;
use crate::retry::with_timeout;
use crate::store::ObjectStore;
use crate::types::{AuditorConfig, BucketName, ProbeOutcome, ProbeVerdict};
use futures::FutureExt;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 隨機探測鍵的前綴
pub const PROBE_KEY_PREFIX: &str = "bucket-audit-probe-";

/// 默認探測內容
pub const DEFAULT_PROBE_CONTENT: &[u8] = b"test-please-delete-this-file";

const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// 探測引擎
///
/// 存儲客戶端與匿名讀取客戶端都是共享的只讀句柄，可跨存儲桶並發使用
#[derive(Clone)]
pub struct ProbeEngine {
    store: Arc<dyn ObjectStore>,
    reader: Arc<dyn PublicReader>,
    content: Vec<u8>,
    fixed_key: Option<String>,
    call_timeout: Duration,
}

impl ProbeEngine {
    pub fn new(store: Arc<dyn ObjectStore>, reader: Arc<dyn PublicReader>) -> Self {
        Self {
            store,
            reader,
            content: DEFAULT_PROBE_CONTENT.to_vec(),
            fixed_key: None,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }

    pub fn from_config(
        store: Arc<dyn ObjectStore>,
        reader: Arc<dyn PublicReader>,
        config: &AuditorConfig,
    ) -> Self {
        let mut engine = Self::new(store, reader)
            .with_content(config.probe_content.as_bytes().to_vec())
            .with_call_timeout(Duration::from_secs(config.call_timeout_secs));
        if let Some(key) = &config.probe_key {
            engine = engine.with_fixed_key(key.clone());
        }
        engine
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = content;
        self
    }

    /// 使用固定鍵代替每次隨機生成的鍵
    ///
    /// 固定鍵可能與存儲桶中已有的對象衝突，並在探測結束時將其刪除
    pub fn with_fixed_key(mut self, key: String) -> Self {
        self.fixed_key = Some(key);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// 本次探測使用的對象鍵
    pub fn next_key(&self) -> String {
        match &self.fixed_key {
            Some(key) => key.clone(),
            None => random_probe_key(),
        }
    }

    /// 探測單個存儲桶
    ///
    /// 永不返回錯誤：所有失敗都降級為否定判定
    pub async fn probe(&self, bucket: &BucketName) -> ProbeVerdict {
        let key = self.next_key();

        // 任何一步 panic 都只影響當前存儲桶
        let write = AssertUnwindSafe(with_timeout(
            "put_object",
            self.call_timeout,
            self.store.put_object(bucket, &key, &self.content),
        ))
        .catch_unwind()
        .await;

        match write {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(bucket = %bucket, error = %e, "Probe write failed, treating as not public");
                return ProbeVerdict::negative(
                    bucket.clone(),
                    ProbeOutcome::WriteFailed(e.to_string()),
                );
            }
            Err(_) => {
                // 寫入未被確認，不做讀取和刪除
                error!(bucket = %bucket, "Probe write panicked, treating as not public");
                return ProbeVerdict::negative(bucket.clone(), ProbeOutcome::CheckPanicked);
            }
        }

        // 讀取檢查即使 panic 也不能跳過清理
        let check = AssertUnwindSafe(async {
            with_timeout(
                "anonymous_head",
                self.call_timeout,
                self.reader.head(bucket, &key),
            )
            .await
        })
        .catch_unwind()
        .await;

        self.cleanup(bucket, &key).await;

        match check {
            Ok(Ok(status)) => {
                let publicly_readable = status == 200;
                debug!(bucket = %bucket, status, publicly_readable, "Anonymous read check completed");
                ProbeVerdict {
                    bucket: bucket.clone(),
                    publicly_readable,
                    outcome: ProbeOutcome::ReadStatus(status),
                }
            }
            Ok(Err(e)) => {
                debug!(bucket = %bucket, error = %e, "Anonymous read failed, treating as not public");
                ProbeVerdict::negative(bucket.clone(), ProbeOutcome::ReadFailed(e.to_string()))
            }
            Err(_) => {
                error!(bucket = %bucket, "Anonymous read check panicked, treating as not public");
                ProbeVerdict::negative(bucket.clone(), ProbeOutcome::CheckPanicked)
            }
        }
    }

    /// 刪除探測對象，恰好嘗試一次
    async fn cleanup(&self, bucket: &BucketName, key: &str) {
        let result = AssertUnwindSafe(with_timeout(
            "delete_object",
            self.call_timeout,
            self.store.delete_object(bucket, key),
        ))
        .catch_unwind()
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                bucket = %bucket,
                key = key,
                error = %e,
                "Failed to delete probe object, it may need manual removal"
            ),
            Err(_) => error!(
                bucket = %bucket,
                key = key,
                "Probe object delete panicked, it may need manual removal"
            ),
        }
    }
}

/// 生成隨機探測鍵
pub fn random_probe_key() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    format!("{}{}", PROBE_KEY_PREFIX, hex::encode(bytes))
}
