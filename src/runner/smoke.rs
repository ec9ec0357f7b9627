//! Test classes shipped with the binary.

use super::{TestClass, TestEnv};
use anyhow::Context;

/// The configured app is in the foreground after setup
pub fn app_launch() -> TestClass {
    TestClass::new("AppLaunch").case("app_is_running", app_is_running)
}

async fn app_is_running(env: TestEnv) -> anyhow::Result<()> {
    let expected = env
        .config
        .app_package()
        .context("app.package is not configured")?;
    let actual = env
        .session
        .current_package()
        .await
        .context("could not read the current package")?;

    log::info!("Current package: {}", actual);
    anyhow::ensure!(actual == expected, "Unexpected package: {}", actual);
    Ok(())
}

pub fn builtin_classes() -> Vec<TestClass> {
    vec![app_launch()]
}
