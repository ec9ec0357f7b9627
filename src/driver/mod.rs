pub mod adb;
pub mod discovery;
pub mod packages;

pub use discovery::{DeviceDiscovery, DeviceRecord, DeviceResolver};

use crate::error::Result;
use colored::Colorize;

/// Print attached Android devices with their AVD names
pub async fn list_devices(discovery: &DeviceDiscovery) -> Result<()> {
    let devices = discovery.list_devices().await?;

    if devices.is_empty() {
        println!("  No Android devices connected");
    } else {
        println!("  Found {} device(s):", devices.len());
        for device in devices {
            let bullet = if device.is_ready() {
                "•".green()
            } else {
                "•".yellow()
            };
            println!(
                "    {} {} {} ({})",
                bullet,
                device.runtime_id.white().bold(),
                device.display_name().cyan(),
                device.state.dimmed()
            );
        }
    }

    Ok(())
}
