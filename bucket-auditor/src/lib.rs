//! S3 公開存儲桶審計工具
//!
//! 本 crate 結合兩個獨立信號找出賬戶內可公開訪問的存儲桶:
//! 1. 探測：寫入臨時對象，再以無憑證請求讀取，讀得到即為公開
//! 2. IAM Access Analyzer：讀取分析器已標記為公開的 S3 存儲桶發現
//!
//! 兩個信號以邏輯 OR 合併為一份報告（或在僅探測模式下報告每個存儲桶的探測結果）。
//!
//! # 架構
//!
//! ```text
//! ┌──────────────┐
//! │   Auditor    │  ← 列出存儲桶、合併信號
//! └──────┬───────┘
//!        │
//!   ┌────┴──────────┬───────────────────┐
//!   ▼               ▼                   ▼
//! ProbeEngine   AnalyzerReconciler   AuditReport
//!   │      │           │
//!   ▼      ▼           ▼
//! ObjectStore  PublicReader  FindingSource
//! (S3 SDK)     (reqwest)     (Access Analyzer SDK)
//! ```
//!
//! 外部服務都通過 trait 形式的能力句柄傳入，測試中可替換為內存假實現。
//!
//! # 示例用法
//!
//! ```no_run
//! use bucket_auditor::{Auditor, AuditorConfig, RunControl};
//! use bucket_auditor::analyzer::AccessAnalyzerSource;
//! use bucket_auditor::public_endpoint::HttpPublicReader;
//! use bucket_auditor::store::S3Store;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuditorConfig::default();
//!     let sdk = bucket_auditor::session::load_sdk_config(&config.region, None).await;
//!
//!     let auditor = Auditor::new(
//!         Arc::new(S3Store::new(&sdk)),
//!         Arc::new(HttpPublicReader::new(&config.public_endpoint_url(), config.endpoint_style, 30)?),
//!         Arc::new(AccessAnalyzerSource::new(&sdk)),
//!         &config,
//!     );
//!
//!     let report = auditor.run(&RunControl::new()).await?;
//!     print!("{}", report.render_text());
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod auditor;
pub mod config;
pub mod error;
pub mod probe;
pub mod public_endpoint;
pub mod report;
pub mod retry;
pub mod session;
pub mod store;
pub mod types;

// Re-export 常用類型
pub use auditor::{Auditor, RunControl};
pub use error::{AuditorError, Result};
pub use report::{AuditReport, ExitStatus};
pub use types::{AuditRecord, AuditorConfig, BucketName, ProbeVerdict, ReportMode};
