use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use droidsuite::driver::packages::{self, InstallOutcome, Installer, UninstallOutcome};
use droidsuite::driver::{self, DeviceDiscovery, DeviceResolver};
use droidsuite::runner::{self, smoke, SuiteContext};
use droidsuite::utils::config::Config;

#[derive(Parser)]
#[command(name = "droidsuite")]
#[command(version = "0.1.0")]
#[command(about = "Android UI test harness driven through Appium and adb", long_about = None)]
struct Cli {
    /// Properties file (defaults to $DROIDSUITE_CONFIG or config/config.properties)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached devices with their AVD names
    Devices {
        /// Print the device records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Wait for a device by AVD name and print its runtime id
    Resolve {
        /// AVD name (defaults to device.name)
        name: Option<String>,

        /// Seconds to wait (defaults to device.wait.seconds)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Check whether a package is installed on a device
    Installed {
        /// Runtime device id, e.g. emulator-5554
        device: String,

        /// Package id (defaults to app.package)
        package: Option<String>,
    },

    /// Install split APKs unless the package is already present
    Install {
        /// Directory holding the *.apk files
        apk_dir: PathBuf,

        /// AVD name (defaults to device.name)
        #[arg(long)]
        avd: Option<String>,

        /// Package id (defaults to app.package)
        #[arg(long)]
        package: Option<String>,
    },

    /// Remove the package from an emulator
    Uninstall {
        /// AVD name (defaults to device.name)
        #[arg(long)]
        avd: Option<String>,

        /// Package id (defaults to app.package)
        #[arg(long)]
        package: Option<String>,
    },

    /// Run the built-in test classes
    Run {
        /// Only run these classes (can be specified multiple times)
        #[arg(short, long)]
        class: Vec<String>,
    },
}

fn package_or_config(package: Option<String>, config: &Config) -> anyhow::Result<String> {
    package
        .or_else(|| config.app_package())
        .context("package not given and app.package missing in config")
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template("  {spinner} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    match cli.command {
        Commands::Devices { json: true } => {
            let records = DeviceDiscovery::system().list_devices().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        Commands::Devices { json: false } => {
            println!("{} Listing Android devices...", "🔍".blue());
            driver::list_devices(&DeviceDiscovery::system()).await?;
        }

        Commands::Resolve { name, timeout } => {
            let discovery = DeviceDiscovery::system();
            let name = name.or_else(|| config.device_name());
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.device_wait());

            let pb = spinner(format!(
                "Waiting for {} (up to {}s)...",
                name.as_deref().unwrap_or("any device"),
                timeout.as_secs()
            ));
            let resolved = discovery.resolve(name.as_deref(), timeout).await;
            pb.finish_and_clear();

            let runtime_id = resolved?;
            println!("{} {}", "✓".green(), runtime_id.white().bold());
        }

        Commands::Installed { device, package } => {
            let package = package_or_config(package, &config)?;
            let discovery = DeviceDiscovery::system();
            if packages::is_installed(discovery.adb(), &device, &package).await {
                println!("{} {} is installed on {}", "✓".green(), package.cyan(), device);
            } else {
                println!("{} {} is not installed on {}", "✗".red(), package.cyan(), device);
                std::process::exit(1);
            }
        }

        Commands::Install {
            apk_dir,
            avd,
            package,
        } => {
            let avd = packages::choose_avd(avd.as_deref(), &config)?;
            let package = package_or_config(package, &config)?;
            let installer = Installer::new(DeviceDiscovery::system(), config.device_wait());

            let pb = spinner(format!("Installing {} on {}...", package, avd));
            let outcome = installer
                .install_split_apks_if_missing(&avd, &package, &apk_dir)
                .await;
            pb.finish_and_clear();

            match outcome.with_context(|| format!("install on {} failed", avd))? {
                InstallOutcome::AlreadyInstalled { device } => {
                    println!("{} {} already installed on {}", "ℹ".blue(), package.cyan(), device)
                }
                InstallOutcome::Installed { device, apks } => println!(
                    "{} Installed {} ({} APKs) on {}",
                    "✓".green(),
                    package.cyan(),
                    apks,
                    device
                ),
            }
        }

        Commands::Uninstall { avd, package } => {
            let avd = packages::choose_avd(avd.as_deref(), &config)?;
            let package = package_or_config(package, &config)?;
            let installer = Installer::new(DeviceDiscovery::system(), config.device_wait());

            match installer.uninstall(&package, &avd).await? {
                UninstallOutcome::DeviceNotFound => {
                    println!("{} No running emulator for {}; skipped", "⚠".yellow(), avd)
                }
                UninstallOutcome::NotInstalled { device } => {
                    println!("{} {} not installed on {}", "ℹ".blue(), package.cyan(), device)
                }
                UninstallOutcome::Uninstalled { device } => {
                    println!("{} Removed {} from {}", "✓".green(), package.cyan(), device)
                }
            }
        }

        Commands::Run { class } => {
            let classes: Vec<_> = smoke::builtin_classes()
                .into_iter()
                .filter(|c| class.is_empty() || class.contains(&c.name))
                .collect();
            if classes.is_empty() {
                anyhow::bail!("No test classes match: {}", class.join(", "));
            }

            println!("{} Running {} test class(es)", "▶".green().bold(), classes.len());
            if let Some(source) = config.source() {
                println!("  Config: {}", source.display().to_string().cyan());
            }

            let ctx = Arc::new(SuiteContext::system(config)?);
            let summary = runner::run_suite(ctx.clone(), classes).await;
            runner::print_summary(&summary);
            if let Some(report) = ctx.report() {
                println!("  Report: {}", report.path().display().to_string().cyan());
            }

            if !summary.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
