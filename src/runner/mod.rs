pub mod context;
pub mod smoke;
pub mod state;

pub use context::SuiteContext;
pub use state::*;

use crate::report::WorkerId;
use crate::session::SessionHandle;
use crate::utils::config::Config;
use colored::Colorize;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Return this (through `anyhow`) from a test to mark it skipped
#[derive(Debug, thiserror::Error)]
#[error("skipped: {0}")]
pub struct Skip(pub String);

/// What a test method gets to work with
#[derive(Clone)]
pub struct TestEnv {
    pub session: SessionHandle,
    pub config: Arc<Config>,
}

type TestFn = Arc<dyn Fn(TestEnv) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub struct TestCase {
    pub name: String,
    run: TestFn,
}

/// A named group of test methods sharing one setup and teardown
pub struct TestClass {
    pub name: String,
    pub cases: Vec<TestCase>,
}

impl TestClass {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cases: Vec::new(),
        }
    }

    pub fn case<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(TestEnv) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.cases.push(TestCase {
            name: name.to_string(),
            run: Arc::new(move |env| f(env).boxed()),
        });
        self
    }

    fn test_name(&self, case: &TestCase) -> String {
        format!("{}.{}", self.name, case.name)
    }
}

/// Run every class on its own task and collect the outcomes.
///
/// Methods of one class run in order. A class whose setup fails has all of
/// its methods recorded as skipped. The report is written once at the end.
pub async fn run_suite(ctx: Arc<SuiteContext>, classes: Vec<TestClass>) -> SuiteSummary {
    let started = Instant::now();
    ctx.init_report();

    let handles: Vec<_> = classes
        .into_iter()
        .map(|class| {
            let ctx = ctx.clone();
            tokio::spawn(async move { run_class(&ctx, class).await })
        })
        .collect();

    let mut summary = SuiteSummary::default();
    for joined in join_all(handles).await {
        match joined {
            Ok(outcomes) => summary.outcomes.extend(outcomes),
            Err(e) => log::error!("Test class task failed: {}", e),
        }
    }

    ctx.finalize_report();
    summary.duration_ms = started.elapsed().as_millis() as u64;
    summary
}

async fn run_class(ctx: &SuiteContext, class: TestClass) -> Vec<TestOutcome> {
    let worker = WorkerId::new(class.name.clone());
    println!("\n{} {}", "▶".blue(), class.name.bold());

    let session = match ctx.setup_class(&worker, &class.name).await {
        Ok(session) => session,
        Err(e) => {
            log::error!("Setup of {} failed: {}", class.name, e);
            let mut outcomes = Vec::new();
            for case in &class.cases {
                let name = class.test_name(case);
                ctx.begin_test(&worker, &name);
                let outcome = TestOutcome::skip(&name, format!("class setup failed: {}", e));
                ctx.end_test(&worker, &outcome).await;
                print_outcome(&outcome);
                outcomes.push(outcome);
            }
            ctx.teardown_class(&class.name).await;
            return outcomes;
        }
    };

    let env = TestEnv {
        session,
        config: ctx.config().clone(),
    };

    let mut outcomes = Vec::new();
    for case in &class.cases {
        let name = class.test_name(case);
        ctx.begin_test(&worker, &name);

        let outcome = run_case(case, env.clone(), &name).await;
        ctx.end_test(&worker, &outcome).await;
        print_outcome(&outcome);
        outcomes.push(outcome);
    }

    ctx.teardown_class(&class.name).await;
    outcomes
}

async fn run_case(case: &TestCase, env: TestEnv, name: &str) -> TestOutcome {
    match AssertUnwindSafe((case.run)(env)).catch_unwind().await {
        Ok(Ok(())) => TestOutcome::pass(name),
        Ok(Err(e)) => match e.downcast_ref::<Skip>() {
            Some(skip) => TestOutcome::skip(name, skip.0.clone()),
            None => TestOutcome::fail(name, format!("{:#}", e)),
        },
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "test panicked".to_string());
            TestOutcome::fail(name, message)
        }
    }
}

fn print_outcome(outcome: &TestOutcome) {
    let marker = match outcome.status {
        TestStatus::Pass => "✓".green(),
        TestStatus::Fail => "✗".red(),
        TestStatus::Skip => "○".yellow(),
    };
    match &outcome.message {
        Some(message) => println!("  {} {} {}", marker, outcome.name, message.dimmed()),
        None => println!("  {} {}", marker, outcome.name),
    }
}

/// Print the end-of-run totals
pub fn print_summary(summary: &SuiteSummary) {
    println!();
    println!(
        "{} {} total, {} passed, {} failed, {} skipped ({} ms)",
        "Summary:".bold(),
        summary.total(),
        summary.passed().to_string().green(),
        summary.failed().to_string().red(),
        summary.skipped().to_string().yellow(),
        summary.duration_ms
    );
}
