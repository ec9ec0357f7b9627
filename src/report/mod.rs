//! Suite report.
//!
//! Each test worker logs into its own current entry; the whole report is
//! written to disk once, when the suite ends.

pub mod html;
pub mod json;
pub mod types;

pub use types::{LogLine, LogStatus, ReportDocument, ReportEntry, ReportSummary};

use crate::error::{HarnessError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Entry that collects logs from a worker with no current test
pub const FALLBACK_ENTRY: &str = "UNASSIGNED_TEST";

/// Identifies one concurrent test worker (one per test class task)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a finished report to disk
pub trait ReportWriter: Send + Sync {
    fn write(&self, document: &ReportDocument, path: &Path) -> Result<()>;
}

/// HTML report plus a JSON sidecar with the same stem
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReportWriter;

impl ReportWriter for HtmlReportWriter {
    fn write(&self, document: &ReportDocument, path: &Path) -> Result<()> {
        html::write(document, path)?;
        json::write(document, &path.with_extension("json"))
    }
}

#[derive(Default)]
struct Entries {
    entries: Vec<ReportEntry>,
    current: HashMap<WorkerId, usize>,
}

pub struct Report {
    run_id: String,
    path: PathBuf,
    started: Instant,
    writer: Arc<dyn ReportWriter>,
    entries: Mutex<Entries>,
    flushed: AtomicBool,
    flush_lock: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Report {
    pub fn new(path: PathBuf) -> Self {
        Self::with_writer(path, Arc::new(HtmlReportWriter))
    }

    pub fn with_writer(path: PathBuf, writer: Arc<dyn ReportWriter>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            path,
            started: Instant::now(),
            writer,
            entries: Mutex::new(Entries::default()),
            flushed: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a new entry and make it the worker's current one
    pub fn create_test(&self, worker: &WorkerId, test_name: &str) {
        let mut guard = lock(&self.entries);
        guard.entries.push(ReportEntry::new(test_name));
        let idx = guard.entries.len() - 1;
        guard.current.insert(worker.clone(), idx);
    }

    /// Append to the worker's current entry.
    ///
    /// A worker without one gets a fresh `UNASSIGNED_TEST` entry so the line
    /// is not lost.
    pub fn add_log(&self, worker: &WorkerId, status: LogStatus, message: &str) {
        let mut guard = lock(&self.entries);
        let existing = guard.current.get(worker).copied();
        let idx = match existing {
            Some(idx) => idx,
            None => {
                guard.entries.push(ReportEntry::new(FALLBACK_ENTRY));
                let idx = guard.entries.len() - 1;
                guard.current.insert(worker.clone(), idx);
                idx
            }
        };

        guard.entries[idx].logs.push(LogLine {
            status,
            message: message.to_string(),
            timestamp: chrono::Local::now().format("%H:%M:%S%.3f").to_string(),
        });
    }

    /// Attach a screenshot to the worker's current entry
    pub fn attach_screenshot(&self, worker: &WorkerId, path: &Path) -> Result<()> {
        let mut guard = lock(&self.entries);
        let idx = *guard.current.get(worker).ok_or_else(|| {
            HarnessError::Report(format!("no active test for worker {}", worker))
        })?;
        guard.entries[idx]
            .screenshots
            .push(path.display().to_string());
        Ok(())
    }

    /// Forget the worker's current entry; the entry itself stays in the report
    pub fn remove_current(&self, worker: &WorkerId) {
        lock(&self.entries).current.remove(worker);
    }

    pub fn has_current(&self, worker: &WorkerId) -> bool {
        lock(&self.entries).current.contains_key(worker)
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        lock(&self.entries).entries.clone()
    }

    pub fn document(&self) -> ReportDocument {
        ReportDocument::new(
            &self.run_id,
            self.entries(),
            self.started.elapsed().as_millis() as u64,
        )
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::SeqCst)
    }

    /// Write the report to disk at most once.
    ///
    /// Returns `Ok(false)` when an earlier call already wrote it. A failed
    /// write leaves the report unflushed.
    pub fn flush(&self) -> Result<bool> {
        let _guard = lock(&self.flush_lock);
        if self.flushed.load(Ordering::SeqCst) {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.writer.write(&self.document(), &self.path)?;
        self.flushed.store(true, Ordering::SeqCst);
        Ok(true)
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Counts writes instead of touching the filesystem
    #[derive(Default)]
    pub struct CountingWriter {
        pub writes: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl ReportWriter for CountingWriter {
        fn write(&self, _document: &ReportDocument, _path: &Path) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(HarnessError::Report("disk full".into()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::CountingWriter;
    use super::*;

    fn report() -> (Report, Arc<CountingWriter>) {
        let writer = Arc::new(CountingWriter::default());
        (
            Report::with_writer(PathBuf::from("report.html"), writer.clone()),
            writer,
        )
    }

    #[test]
    fn test_logs_go_to_worker_entry() {
        let (report, _) = report();
        let a = WorkerId::new("a");
        let b = WorkerId::new("b");

        report.create_test(&a, "A.first");
        report.create_test(&b, "B.first");
        report.add_log(&a, LogStatus::Pass, "a passed");
        report.add_log(&b, LogStatus::Fail, "b failed");

        let entries = report.entries();
        assert_eq!(entries[0].test_name, "A.first");
        assert_eq!(entries[0].logs[0].message, "a passed");
        assert_eq!(entries[1].logs[0].message, "b failed");
    }

    #[test]
    fn test_fallback_entry_for_unknown_worker() {
        let (report, _) = report();
        let w = WorkerId::new("w");

        report.add_log(&w, LogStatus::Info, "first");
        report.add_log(&w, LogStatus::Info, "second");

        let entries = report.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].test_name, FALLBACK_ENTRY);
        assert_eq!(entries[0].logs.len(), 2);
    }

    #[test]
    fn test_remove_current_keeps_entry() {
        let (report, _) = report();
        let w = WorkerId::new("w");
        report.create_test(&w, "T.one");
        report.remove_current(&w);

        assert!(!report.has_current(&w));
        assert_eq!(report.entries().len(), 1);
        assert!(report.attach_screenshot(&w, Path::new("x.jpeg")).is_err());
    }

    #[test]
    fn test_flush_at_most_once() {
        let (report, writer) = report();

        assert!(report.flush().unwrap());
        for _ in 0..4 {
            assert!(!report.flush().unwrap());
        }

        assert!(report.is_flushed());
        assert_eq!(writer.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_flush_can_retry() {
        let (report, writer) = report();
        writer.fail.store(true, Ordering::SeqCst);

        assert!(report.flush().is_err());
        assert!(!report.is_flushed());

        writer.fail.store(false, Ordering::SeqCst);
        assert!(report.flush().unwrap());
        assert_eq!(writer.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_flush_writes_once() {
        let (report, writer) = report();
        let report = Arc::new(report);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let report = report.clone();
                std::thread::spawn(move || report.flush().unwrap())
            })
            .collect();
        let wrote: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(wrote, 1);
        assert_eq!(writer.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_html_writer_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("report-1.html");
        let report = Report::new(path.clone());
        let w = WorkerId::new("w");
        report.create_test(&w, "AppLaunch.app_is_running");
        report.add_log(&w, LogStatus::Pass, "Test passed");

        report.flush().unwrap();

        assert!(path.exists());
        assert!(path.with_extension("json").exists());
    }
}
