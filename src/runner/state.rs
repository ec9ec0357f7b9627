use crate::report::LogStatus;

/// Final status of one test method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
}

impl TestStatus {
    /// Severity used for the report line
    pub fn log_status(&self) -> LogStatus {
        match self {
            TestStatus::Pass => LogStatus::Pass,
            TestStatus::Fail => LogStatus::Fail,
            TestStatus::Skip => LogStatus::Skip,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestOutcome {
    /// `<Class>.<method>`
    pub name: String,
    pub status: TestStatus,
    /// Failure or skip reason
    pub message: Option<String>,
    pub timestamp: String,
}

impl TestOutcome {
    fn new(name: &str, status: TestStatus, message: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn pass(name: &str) -> Self {
        Self::new(name, TestStatus::Pass, None)
    }

    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Fail, Some(message.into()))
    }

    pub fn skip(name: &str, reason: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Skip, Some(reason.into()))
    }

    /// Line written to the report for this outcome
    pub fn report_message(&self) -> String {
        let verb = match self.status {
            TestStatus::Pass => "passed",
            TestStatus::Fail => "failed",
            TestStatus::Skip => "skipped",
        };
        match &self.message {
            Some(message) => format!("Test {}: {} ({})", verb, self.name, message),
            None => format!("Test {}: {}", verb, self.name),
        }
    }
}

/// Outcome of a whole suite run
#[derive(Debug, Clone, Default)]
pub struct SuiteSummary {
    pub outcomes: Vec<TestOutcome>,
    pub duration_ms: u64,
}

impl SuiteSummary {
    fn count(&self, status: TestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.count(TestStatus::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(TestStatus::Fail)
    }

    pub fn skipped(&self) -> usize {
        self.count(TestStatus::Skip)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}
