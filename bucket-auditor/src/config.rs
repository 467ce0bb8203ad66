//! 配置管理模塊
//!
//! 負責加載和驗證審計工具配置。
//!
//! 配置來源按優先級從低到高：
//! 1. `AuditorConfig::default()`（讀取 `AWS_REGION` / `AWS_PROFILE`）
//! 2. 可選的配置文件（TOML、JSON、YAML）
//! 3. `BUCKET_AUDIT_` 前綴的環境變量
//!
//! 命令行參數在 `main.rs` 中覆蓋以上結果。加載函數只負責解析，
//! [`validate_config`] 在所有覆蓋完成後調用一次。

use crate::error::{AuditorError, Result};
use crate::types::{AuditorConfig, EndpointStyle};
use config::{Config, Environment, File};
use std::path::Path;

/// 環境變量前綴
pub const ENV_PREFIX: &str = "BUCKET_AUDIT";

/// 從配置文件加載審計配置，並疊加環境變量
///
/// 不做驗證：調用方在應用命令行覆蓋後再調用 [`validate_config`]
///
/// # 參數
/// - `config_path`: 配置文件路徑（支持 TOML、JSON、YAML）
///
/// # 示例
/// ```no_run
/// use bucket_auditor::config::load_config;
///
/// let config = load_config("bucket-audit.toml").expect("Failed to load config");
/// println!("Region: {}", config.region);
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<AuditorConfig> {
    let config = Config::builder()
        .add_source(File::from(config_path.as_ref()))
        .add_source(env_source())
        .build()
        .map_err(|e| AuditorError::Config(format!("Failed to load config file: {}", e)))?;

    let auditor_config: AuditorConfig = config
        .try_deserialize()
        .map_err(|e| AuditorError::Config(format!("Failed to parse config: {}", e)))?;

    Ok(auditor_config)
}

/// 僅從環境變量加載配置
///
/// 示例: `BUCKET_AUDIT_REGION`, `BUCKET_AUDIT_CONCURRENCY`, `BUCKET_AUDIT_MODE=probe-only`
pub fn load_config_from_env() -> Result<AuditorConfig> {
    let config = Config::builder()
        .add_source(env_source())
        .build()
        .map_err(|e| AuditorError::Config(format!("Failed to load env vars: {}", e)))?;

    let auditor_config: AuditorConfig = config
        .try_deserialize()
        .map_err(|e| AuditorError::Config(format!("Failed to parse env config: {}", e)))?;

    Ok(auditor_config)
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX).try_parsing(true)
}

/// 驗證配置的有效性
///
/// 檢查:
/// - 區域不能為空
/// - 並發數與超時必須大於 0
/// - 匿名讀取端點必須是 http(s) URL
/// - 固定探測鍵不能為空字符串
pub fn validate_config(config: &AuditorConfig) -> Result<()> {
    if config.region.trim().is_empty() {
        return Err(AuditorError::Config("region must not be empty".to_string()));
    }

    if config.concurrency == 0 {
        return Err(AuditorError::Config(
            "concurrency must be greater than 0".to_string(),
        ));
    }

    if config.call_timeout_secs == 0 {
        return Err(AuditorError::Config(
            "call_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.run_deadline_secs == Some(0) {
        return Err(AuditorError::Config(
            "run_deadline_secs must be greater than 0 when set".to_string(),
        ));
    }

    if config.probe_content.is_empty() {
        return Err(AuditorError::Config(
            "probe_content must not be empty".to_string(),
        ));
    }

    if let Some(key) = &config.probe_key {
        if key.trim().is_empty() {
            return Err(AuditorError::Config("probe_key must not be empty".to_string()));
        }
    }

    let endpoint = config.public_endpoint_url();
    let parsed = url::Url::parse(&endpoint)
        .map_err(|e| AuditorError::Config(format!("Invalid public endpoint {}: {}", endpoint, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AuditorError::Config(format!(
            "Invalid public endpoint scheme: {}",
            endpoint
        )));
    }

    if config.endpoint_style == EndpointStyle::VirtualHost && parsed.host_str().is_none() {
        return Err(AuditorError::Config(format!(
            "Virtual-host endpoint requires a host: {}",
            endpoint
        )));
    }

    Ok(())
}
