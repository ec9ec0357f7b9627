use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of one report log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    Pass,
    Fail,
    Skip,
    Info,
    Warning,
}

impl LogStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LogStatus::Pass => "PASS",
            LogStatus::Fail => "FAIL",
            LogStatus::Skip => "SKIP",
            LogStatus::Info => "INFO",
            LogStatus::Warning => "WARNING",
        }
    }

    /// Rank used to pick an entry's overall status; higher wins
    fn weight(&self) -> u8 {
        match self {
            LogStatus::Info => 0,
            LogStatus::Pass => 1,
            LogStatus::Warning => 2,
            LogStatus::Skip => 3,
            LogStatus::Fail => 4,
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub status: LogStatus,
    pub message: String,
    pub timestamp: String,
}

/// One named node of the report: the log of one test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub test_name: String,
    pub logs: Vec<LogLine>,
    pub screenshots: Vec<String>,
    pub started_at: String,
}

impl ReportEntry {
    pub fn new(test_name: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            logs: Vec::new(),
            screenshots: Vec::new(),
            started_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Most severe status logged, INFO for an entry with no verdict
    pub fn status(&self) -> LogStatus {
        self.logs
            .iter()
            .map(|l| l.status)
            .max_by_key(LogStatus::weight)
            .unwrap_or(LogStatus::Info)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub duration_ms: u64,
}

/// Everything written at flush time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub run_id: String,
    pub entries: Vec<ReportEntry>,
    pub summary: ReportSummary,
    pub generated_at: String,
}

impl ReportDocument {
    pub fn new(run_id: &str, entries: Vec<ReportEntry>, duration_ms: u64) -> Self {
        let mut summary = ReportSummary {
            total: entries.len() as u32,
            duration_ms,
            ..Default::default()
        };
        for entry in &entries {
            match entry.status() {
                LogStatus::Pass => summary.passed += 1,
                LogStatus::Fail => summary.failed += 1,
                LogStatus::Skip => summary.skipped += 1,
                _ => {}
            }
        }

        Self {
            run_id: run_id.to_string(),
            entries,
            summary,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
