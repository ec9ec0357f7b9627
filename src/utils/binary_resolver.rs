use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};

/// Locate the `adb` binary.
///
/// Lookup order: `ADB` env var, `$ANDROID_HOME` / `$ANDROID_SDK_ROOT`
/// platform-tools, the default SDK location under the home directory, then
/// the system PATH.
pub fn find_adb() -> Result<PathBuf> {
    let mut checked_paths = Vec::new();

    if let Ok(explicit) = std::env::var("ADB") {
        let path = PathBuf::from(&explicit);
        checked_paths.push(format!("ADB env: {:?}", path));
        if path.exists() {
            return Ok(path);
        }
    }

    for sdk in sdk_roots() {
        let candidate = platform_tools_adb(&sdk);
        checked_paths.push(format!("SDK: {:?}", candidate));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    if let Ok(path) = which::which(adb_name()) {
        return Ok(path);
    }
    checked_paths.push(format!("PATH: {}", adb_name()));

    Err(HarnessError::AdbUnavailable(format!(
        "could not find '{}'. Checked paths:\n{}",
        adb_name(),
        checked_paths.join("\n")
    )))
}

fn adb_name() -> &'static str {
    if cfg!(windows) {
        "adb.exe"
    } else {
        "adb"
    }
}

fn platform_tools_adb(sdk_root: &Path) -> PathBuf {
    sdk_root.join("platform-tools").join(adb_name())
}

/// Candidate Android SDK roots, most specific first
fn sdk_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                roots.push(PathBuf::from(value));
            }
        }
    }

    if let Some(home) = dirs::home_dir() {
        #[cfg(target_os = "macos")]
        roots.push(home.join("Library").join("Android").join("sdk"));

        #[cfg(target_os = "windows")]
        roots.push(
            home.join("AppData")
                .join("Local")
                .join("Android")
                .join("Sdk"),
        );

        #[cfg(target_os = "linux")]
        roots.push(home.join("Android").join("Sdk"));
    }

    roots
}
