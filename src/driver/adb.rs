use crate::error::{HarnessError, Result};
use crate::utils::binary_resolver;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Captured result of one adb invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs the adb tool.
///
/// `run` only fails when the process cannot be launched at all; a non-zero
/// exit is reported through `CommandOutput::success`.
#[async_trait]
pub trait AdbRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs the adb binary found by `binary_resolver::find_adb`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAdb;

#[async_trait]
impl AdbRunner for SystemAdb {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let adb_path = binary_resolver::find_adb()?;
        log::debug!("adb {}", args.join(" "));

        let output = Command::new(adb_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| HarnessError::Command {
                command: format!("adb {}", args.join(" ")),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Execute an adb command, optionally scoped to one device, failing on a
/// non-zero exit.
pub async fn exec(adb: &dyn AdbRunner, serial: Option<&str>, args: &[&str]) -> Result<String> {
    let mut full_args = Vec::with_capacity(args.len() + 2);

    if let Some(s) = serial {
        full_args.push("-s");
        full_args.push(s);
    }
    full_args.extend_from_slice(args);

    let output = adb.run(&full_args).await?;
    if !output.success {
        return Err(HarnessError::Command {
            command: format!("adb {}", full_args.join(" ")),
            message: output.stderr.trim().to_string(),
        });
    }

    Ok(output.stdout)
}

/// Execute `adb shell <args>` on a device
pub async fn shell(adb: &dyn AdbRunner, serial: &str, args: &[&str]) -> Result<String> {
    let mut full_args = vec!["shell"];
    full_args.extend_from_slice(args);
    exec(adb, Some(serial), &full_args).await
}


#[cfg(test)]
mod tests {
    use super::fake::FakeAdb;
    use super::*;

    #[tokio::test]
    async fn test_exec_scopes_to_serial() {
        let adb = FakeAdb::new().on("-s emulator-5554 emu avd name", "Pixel_9\nOK\n");

        let out = exec(&adb, Some("emulator-5554"), &["emu", "avd", "name"])
            .await
            .unwrap();

        assert_eq!(out, "Pixel_9\nOK\n");
        assert_eq!(adb.calls(), vec!["-s emulator-5554 emu avd name"]);
    }

    #[tokio::test]
    async fn test_exec_fails_on_non_zero_exit() {
        let adb = FakeAdb::new().on_failure("-s emulator-5554 uninstall com.x", "Failure");

        let err = exec(&adb, Some("emulator-5554"), &["uninstall", "com.x"])
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Command { .. }));
        assert!(err.to_string().contains("Failure"));
    }

    #[tokio::test]
    async fn test_shell_prefixes_shell() {
        let adb = FakeAdb::new().on(
            "-s emulator-5554 shell pm list packages com.x",
            "package:com.x\n",
        );

        let out = shell(&adb, "emulator-5554", &["pm", "list", "packages", "com.x"])
            .await
            .unwrap();
        assert_eq!(out.trim(), "package:com.x");
    }
}
