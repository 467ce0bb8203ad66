//! 審計報告模塊
//!
//! 報告的兩種輸出：
//! - 文本：每個報告的存儲桶一行，`<名稱左對齊 60 列>\t(public: .., awspublic: ..)`
//! - JSON：完整報告，包括運行元數據和分析器覆蓋情況
//!
//! 以及進程退出碼：完成且無公開存儲桶、完成且發現公開存儲桶、中止。

use crate::error::Result;
use crate::types::{AnalyzerCoverage, AuditRecord, OutputFormat, ReportMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// 存儲桶名稱列寬
pub const BUCKET_COLUMN_WIDTH: usize = 60;

/// 一次審計運行的完整報告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub region: String,
    pub mode: ReportMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// 列出的存儲桶總數
    pub buckets_listed: usize,

    /// 實際完成探測的存儲桶數
    pub buckets_probed: usize,

    /// 因取消或截止時間未探測的存儲桶數
    pub buckets_skipped: usize,

    pub cancelled: bool,

    /// 分析器信號的可用性
    pub analyzer: AnalyzerCoverage,

    pub analyzer_pages_failed: usize,

    pub records: Vec<AuditRecord>,
}

impl AuditReport {
    /// 被任一信號認定為公開的存儲桶數
    pub fn public_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_public()).count()
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.public_count() > 0 {
            ExitStatus::PublicFound
        } else {
            ExitStatus::Clean
        }
    }

    /// 單條記錄的文本行
    pub fn format_line(&self, record: &AuditRecord) -> String {
        match self.mode {
            ReportMode::AnalyzerAssisted => format!(
                "{:<width$}\t(public: {}, awspublic: {})",
                record.bucket.as_str(),
                record.probe_public,
                record.analyzer_public,
                width = BUCKET_COLUMN_WIDTH
            ),
            ReportMode::ProbeOnly => format!(
                "{:<width$}\t(public: {})",
                record.bucket.as_str(),
                record.probe_public,
                width = BUCKET_COLUMN_WIDTH
            ),
        }
    }

    pub fn render_text(&self) -> String {
        self.records
            .iter()
            .map(|record| format!("{}\n", self.format_line(record)))
            .collect()
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => {
                let mut json = self.render_json()?;
                json.push('\n');
                Ok(json)
            }
        }
    }

    /// 寫出報告到指定輸出（通常是標準輸出）
    pub fn write_to<W: Write>(&self, out: &mut W, format: OutputFormat) -> Result<()> {
        out.write_all(self.render(format)?.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// 進程退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// 審計完成，未發現公開存儲桶
    Clean,
    /// 設置階段致命錯誤，未產生報告
    Aborted,
    /// 審計完成，發現至少一個公開存儲桶
    PublicFound,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::Aborted => 1,
            ExitStatus::PublicFound => 2,
        }
    }
}
