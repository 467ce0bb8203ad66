//! AWS 會話配置
//!
//! 為單一區域和命名 profile 構建 SDK 配置，並在審計開始前解析一次憑證，
//! 讓憑證問題作為設置階段的致命錯誤立即暴露，而不是在第一個存儲桶上才出現。

use crate::error::{AuditorError, Result};
use crate::retry::with_timeout;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use std::time::Duration;
use tracing::{debug, info};

/// 加載 SDK 配置
///
/// `profile` 為 `None` 時使用默認憑證鏈（環境變量、共享配置、實例角色等）
pub async fn load_sdk_config(region: &str, profile: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()));

    if let Some(profile) = profile {
        debug!("Using shared config profile: {}", profile);
        loader = loader.profile_name(profile);
    }

    loader.load().await
}

/// 解析憑證，失敗即為致命錯誤
pub async fn verify_credentials(sdk_config: &SdkConfig, timeout: Duration) -> Result<()> {
    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| AuditorError::Config("no credentials provider configured".to_string()))?;

    let credentials = with_timeout("load_credentials", timeout, async {
        provider
            .provide_credentials()
            .await
            .map_err(|e| AuditorError::Config(format!("unable to load AWS credentials: {}", e)))
    })
    .await?;

    info!("AWS credentials loaded (access key id {}…)", redact(credentials.access_key_id()));
    Ok(())
}

fn redact(access_key_id: &str) -> String {
    access_key_id.chars().take(4).collect()
}
