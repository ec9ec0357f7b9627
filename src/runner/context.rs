use super::state::{TestOutcome, TestStatus};
use crate::driver::DeviceDiscovery;
use crate::error::Result;
use crate::report::{HtmlReportWriter, LogStatus, Report, ReportWriter, WorkerId};
use crate::session::screenshot::{capture_and_save, screenshot_path};
use crate::session::{AppiumFactory, SessionHandle, SessionManager};
use crate::utils::config::Config;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// `<report.dir or <root>/reports>/<report.filename or report-<yyyyMMdd-HHmmss>.html>`
pub fn report_path(config: &Config, root: &Path, now: DateTime<Local>) -> PathBuf {
    let dir = match config.report_dir() {
        Some(dir) => root.join(dir),
        None => root.join("reports"),
    };
    let filename = config
        .report_filename()
        .unwrap_or_else(|| format!("report-{}.html", now.format("%Y%m%d-%H%M%S")));
    dir.join(filename)
}

/// State shared by every test class of one suite run.
///
/// The hooks run in the order `init_report`, `setup_class`, `begin_test`,
/// `end_test`, `teardown_class`, `finalize_report`. Only `setup_class`
/// returns an error; the others log and carry on.
pub struct SuiteContext {
    config: Arc<Config>,
    sessions: Arc<SessionManager>,
    root: PathBuf,
    writer: Arc<dyn ReportWriter>,
    report: Mutex<Option<Arc<Report>>>,
    /// Classes currently holding the shared session
    classes: tokio::sync::Mutex<HashSet<String>>,
}

impl SuiteContext {
    pub fn new(config: Config, sessions: Arc<SessionManager>, root: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            root,
            writer: Arc::new(HtmlReportWriter),
            report: Mutex::new(None),
            classes: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Context backed by adb, Appium and the current directory
    pub fn system(config: Config) -> Result<Self> {
        let sessions = SessionManager::new(
            Arc::new(DeviceDiscovery::system()),
            Arc::new(AppiumFactory),
        );
        let root = std::env::current_dir()?;
        Ok(Self::new(config, Arc::new(sessions), root))
    }

    pub fn with_report_writer(mut self, writer: Arc<dyn ReportWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    pub fn report(&self) -> Option<Arc<Report>> {
        self.report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create the suite report. Returns `false` if it already exists.
    pub fn init_report(&self) -> bool {
        let mut slot = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            log::info!("Report already initialized");
            return false;
        }

        let path = report_path(&self.config, &self.root, Local::now());
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                log::warn!("Could not create reports directory {}: {}", dir.display(), e);
            }
        }

        log::info!("Initialized report: {}", path.display());
        *slot = Some(Arc::new(Report::with_writer(path, self.writer.clone())));
        true
    }

    fn log(&self, worker: &WorkerId, status: LogStatus, message: &str) {
        match self.report() {
            Some(report) => report.add_log(worker, status, message),
            None => log::warn!("Report is not initialized; dropping: {}", message),
        }
    }

    /// Acquire the shared session for `class_name` and bring the app to the
    /// foreground.
    ///
    /// Fails when no device can be resolved or the session cannot be
    /// created; the class must not run then.
    pub async fn setup_class(&self, worker: &WorkerId, class_name: &str) -> Result<SessionHandle> {
        let dir = self.screenshots_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::warn!("Could not create {}: {}", dir.display(), e);
        }

        let mut classes = self.classes.lock().await;
        let session = self.sessions.acquire(&self.config).await?;
        classes.insert(class_name.to_string());
        drop(classes);

        if let Some(package) = self.config.app_package() {
            match session.activate_app(&package).await {
                Ok(()) => self.log(worker, LogStatus::Info, &format!("App activated: {}", package)),
                Err(e) => log::warn!("activate_app failed (non-fatal): {}", e),
            }
        }

        Ok(session)
    }

    /// Open a report entry for `test_name` on this worker
    pub fn begin_test(&self, worker: &WorkerId, test_name: &str) {
        match self.report() {
            Some(report) => {
                report.create_test(worker, test_name);
                report.add_log(worker, LogStatus::Info, &format!("Starting test: {}", test_name));
            }
            None => log::warn!("Report is not initialized; {} has no report entry", test_name),
        }
    }

    /// Record the outcome; a failure also gets a screenshot.
    ///
    /// Screenshot capture and attachment fail independently of each other
    /// and of the log line. The worker's current entry is always released.
    pub async fn end_test(&self, worker: &WorkerId, outcome: &TestOutcome) {
        self.log(worker, outcome.status.log_status(), &outcome.report_message());

        if outcome.status == TestStatus::Fail {
            self.attach_failure_screenshot(worker, &outcome.name).await;
        }

        if let Some(report) = self.report() {
            report.remove_current(worker);
        }
    }

    async fn attach_failure_screenshot(&self, worker: &WorkerId, test_name: &str) {
        if !self.sessions.is_active().await {
            log::warn!("Session inactive; skipping screenshot for {}", test_name);
            return;
        }
        let Some(session) = self.sessions.current().await else {
            return;
        };

        let path = screenshot_path(&self.screenshots_dir(), test_name, Local::now());
        let saved = match capture_and_save(session.as_ref(), &path).await {
            Ok(saved) => saved,
            Err(e) => {
                log::warn!("Screenshot capture failed for {}: {}", test_name, e);
                return;
            }
        };

        let attached = match self.report() {
            Some(report) => report.attach_screenshot(worker, &saved),
            None => Ok(()),
        };
        if let Err(e) = attached {
            log::warn!("Attaching screenshot failed: {}", e);
        }
    }

    /// Let go of the shared session for `class_name`.
    ///
    /// The session is quit, if still alive, once no other class holds it.
    /// Repeated calls for the same class do nothing.
    pub async fn teardown_class(&self, class_name: &str) {
        let mut classes = self.classes.lock().await;
        if !classes.remove(class_name) {
            log::info!("No active session to quit for {}", class_name);
            return;
        }
        if !classes.is_empty() {
            log::debug!("Session still used by {} class(es)", classes.len());
            return;
        }

        match self.sessions.release_if_alive().await {
            Ok(true) => log::info!("Session quit successfully"),
            Ok(false) => log::info!("No active session to quit"),
            Err(e) => log::error!("Error while quitting session: {}", e),
        }
    }

    /// Write the report. Only the first successful call writes.
    pub fn finalize_report(&self) -> bool {
        let Some(report) = self.report() else {
            log::error!("Report is not initialized; nothing to flush");
            return false;
        };

        match report.flush() {
            Ok(true) => {
                log::info!("Report flushed to: {}", report.path().display());
                true
            }
            Ok(false) => {
                log::info!("Report already flushed - skipping");
                false
            }
            Err(e) => {
                log::error!("Failed flushing report: {}", e);
                false
            }
        }
    }
}
