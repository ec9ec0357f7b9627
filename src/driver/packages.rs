//! Package presence checks and split-APK installation.

use super::adb::{self, AdbRunner};
use super::discovery::DeviceDiscovery;
use crate::error::{HarnessError, Result};
use crate::utils::config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Whether `package_id` is installed on the device.
///
/// Any adb failure reads as "not installed" so callers re-install rather
/// than skip.
pub async fn is_installed(adb: &dyn AdbRunner, runtime_id: &str, package_id: &str) -> bool {
    match adb::shell(adb, runtime_id, &["pm", "list", "packages", package_id]).await {
        Ok(out) => has_package_token(&out, package_id),
        Err(e) => {
            log::warn!(
                "Package check for {} on {} failed: {}",
                package_id,
                runtime_id,
                e
            );
            false
        }
    }
}

/// `pm list packages <filter>` prints one `package:<id>` line per match,
/// and the filter is a substring match, so compare whole lines.
fn has_package_token(output: &str, package_id: &str) -> bool {
    let expected = format!("package:{}", package_id);
    output.lines().any(|line| line.trim() == expected)
}

/// Pick the AVD to operate on: the explicit name, else `device.name`.
pub fn choose_avd(explicit: Option<&str>, config: &Config) -> Result<String> {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    config.device_name().ok_or_else(|| {
        HarnessError::Config("device name not provided and device.name missing in config".into())
    })
}

/// `*.apk` files directly inside `dir`, sorted by file name.
///
/// Relative directories resolve against the current working directory.
pub fn collect_apks(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };

    if !dir.is_dir() {
        return Err(HarnessError::Install(format!(
            "APK directory not found: {}",
            dir.display()
        )));
    }

    let apks: Vec<PathBuf> = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("apk"))
        })
        .collect();

    if apks.is_empty() {
        return Err(HarnessError::Install(format!(
            "No APK files found in: {}",
            dir.display()
        )));
    }

    Ok(apks)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled { device: String },
    Installed { device: String, apks: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    DeviceNotFound,
    NotInstalled { device: String },
    Uninstalled { device: String },
}

/// Installs and removes app builds on a named emulator
pub struct Installer {
    discovery: DeviceDiscovery,
    wait: Duration,
}

impl Installer {
    pub fn new(discovery: DeviceDiscovery, wait: Duration) -> Self {
        Self { discovery, wait }
    }

    fn adb(&self) -> &dyn AdbRunner {
        self.discovery.adb()
    }

    /// Install every APK in `apk_dir` with `install-multiple`, unless the
    /// package is already on the device.
    pub async fn install_split_apks_if_missing(
        &self,
        avd_name: &str,
        package_id: &str,
        apk_dir: &Path,
    ) -> Result<InstallOutcome> {
        let device = self
            .discovery
            .resolve_device_id(avd_name, self.wait)
            .await?;

        if is_installed(self.adb(), &device, package_id).await {
            log::info!("App already installed: {} on {}", package_id, device);
            return Ok(InstallOutcome::AlreadyInstalled { device });
        }

        let apks = collect_apks(apk_dir)?;
        let apk_args: Vec<String> = apks.iter().map(|p| p.display().to_string()).collect();

        let mut args = vec!["install-multiple", "-r"];
        args.extend(apk_args.iter().map(String::as_str));

        log::info!("Installing {} APK(s) on {} ...", apks.len(), device);
        let out = adb::exec(self.adb(), Some(&device), &args)
            .await
            .map_err(|e| HarnessError::Install(e.to_string()))?;
        for line in out.lines().filter(|l| !l.trim().is_empty()) {
            log::info!("[adb] {}", line.trim());
        }
        log::info!("Install finished.");

        Ok(InstallOutcome::Installed {
            device,
            apks: apks.len(),
        })
    }

    /// Remove `package_id` from the emulator. A missing device or package
    /// is not an error.
    pub async fn uninstall(&self, package_id: &str, avd_name: &str) -> Result<UninstallOutcome> {
        let device = match self.discovery.resolve_device_id(avd_name, self.wait).await {
            Ok(device) => device,
            Err(HarnessError::DeviceNotFound { .. }) => {
                log::warn!(
                    "No running emulator found for AVD: {} - skipping uninstall.",
                    avd_name
                );
                return Ok(UninstallOutcome::DeviceNotFound);
            }
            Err(e) => return Err(e),
        };

        if !is_installed(self.adb(), &device, package_id).await {
            log::info!("Package not installed on {}: {}", device, package_id);
            return Ok(UninstallOutcome::NotInstalled { device });
        }

        log::info!("Uninstalling {} from {} ...", package_id, device);
        adb::exec(self.adb(), Some(&device), &["uninstall", package_id])
            .await
            .map_err(|e| HarnessError::Install(e.to_string()))?;
        log::info!("Uninstall finished.");

        Ok(UninstallOutcome::Uninstalled { device })
    }
}
