//! Device discovery.
//!
//! Maps the runtime ids adb assigns to running devices (`emulator-5554`) to
//! the logical AVD names they were booted from, and waits for a named device
//! to come up.

use super::adb::{self, AdbRunner, SystemAdb};
use crate::error::{HarnessError, Result};
use crate::utils::clock::{Clock, SystemClock};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Cadence of the discovery loop
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Display name for a device whose logical name could not be read
pub const UNKNOWN_NAME: &str = "unknown";

/// adb state token of a device that accepts commands
const READY_STATE: &str = "device";

/// One line of `adb devices -l`, plus its logical name when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub runtime_id: String,
    pub state: String,
    pub logical_name: Option<String>,
}

impl DeviceRecord {
    pub fn is_ready(&self) -> bool {
        self.state == READY_STATE
    }

    pub fn display_name(&self) -> &str {
        self.logical_name.as_deref().unwrap_or(UNKNOWN_NAME)
    }

    /// Case-insensitive exact match. A device without a logical name never
    /// matches.
    pub fn matches(&self, logical_name: &str) -> bool {
        self.logical_name
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(logical_name))
    }
}

/// Resolves the device a session should attach to.
#[async_trait]
pub trait DeviceResolver: Send + Sync {
    /// `None` picks any ready device.
    async fn resolve(&self, logical_name: Option<&str>, timeout: Duration) -> Result<String>;
}

/// Parse `adb devices [-l]` output into `(runtime_id, state)` pairs.
///
/// Skips the header, daemon status lines and blank lines.
pub fn parse_device_list(output: &str) -> Vec<(String, String)> {
    static LINE: OnceLock<Regex> = OnceLock::new();
    let re = LINE.get_or_init(|| Regex::new(r"^(\S+)\s+(\S+)").expect("valid device regex"));

    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*')
        })
        .filter_map(|line| {
            re.captures(line)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        })
        .collect()
}

/// Extract the AVD name from `adb emu avd name` output.
///
/// The emulator console answers with the name followed by an `OK` line.
pub fn parse_avd_name(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && *line != "OK")
        .filter(|line| !line.starts_with("error:") && !line.starts_with("KO"))
        .map(str::to_string)
}

pub struct DeviceDiscovery {
    adb: Arc<dyn AdbRunner>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl DeviceDiscovery {
    pub fn new(adb: Arc<dyn AdbRunner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            adb,
            clock,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Discovery backed by the real adb binary and wall clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemAdb), Arc::new(SystemClock::new()))
    }

    pub fn adb(&self) -> &dyn AdbRunner {
        self.adb.as_ref()
    }

    /// One `adb devices -l` pass without logical-name lookups
    async fn list_raw(&self) -> Result<Vec<(String, String)>> {
        let stdout = adb::exec(self.adb.as_ref(), None, &["devices", "-l"]).await?;
        Ok(parse_device_list(&stdout))
    }

    /// Logical name of a running emulator, `None` on any failure
    pub async fn logical_name(&self, runtime_id: &str) -> Option<String> {
        match adb::exec(self.adb.as_ref(), Some(runtime_id), &["emu", "avd", "name"]).await {
            Ok(out) => parse_avd_name(&out),
            Err(e) => {
                log::debug!("Could not read AVD name of {}: {}", runtime_id, e);
                None
            }
        }
    }

    async fn record(&self, runtime_id: String, state: String) -> DeviceRecord {
        let logical_name = if state == READY_STATE {
            self.logical_name(&runtime_id).await
        } else {
            None
        };

        DeviceRecord {
            runtime_id,
            state,
            logical_name,
        }
    }

    /// Every attached device with its logical name resolved where possible
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let mut records = Vec::new();
        for (runtime_id, state) in self.list_raw().await? {
            records.push(self.record(runtime_id, state).await);
        }
        Ok(records)
    }

    /// One discovery pass: the first ready device named `logical_name`.
    ///
    /// A pass whose device listing fails counts as finding nothing. No name
    /// query starts once the clock reaches `deadline`.
    async fn scan_for(&self, logical_name: &str, deadline: Duration) -> Option<String> {
        let entries = match self.list_raw().await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Device listing failed: {}", e);
                return None;
            }
        };

        for (runtime_id, state) in entries {
            if state != READY_STATE {
                continue;
            }
            if self.clock.elapsed() >= deadline {
                break;
            }
            let record = self.record(runtime_id, state).await;
            log::debug!("{} -> {}", record.runtime_id, record.display_name());
            if record.matches(logical_name) {
                return Some(record.runtime_id);
            }
        }

        None
    }

    /// Wait until a device named `logical_name` is running.
    ///
    /// Polls every two seconds while less than `timeout` has elapsed. The
    /// last sleep is cut short at the deadline and no adb call starts after
    /// it, so `DeviceNotFound` comes at most one adb call past `timeout`.
    pub async fn resolve_device_id(&self, logical_name: &str, timeout: Duration) -> Result<String> {
        let started = self.clock.elapsed();
        let deadline = started + timeout;

        loop {
            if self.clock.elapsed() >= deadline {
                break;
            }
            if let Some(runtime_id) = self.scan_for(logical_name, deadline).await {
                log::info!("Resolved {} -> {}", logical_name, runtime_id);
                return Ok(runtime_id);
            }

            let remaining = deadline.saturating_sub(self.clock.elapsed());
            if remaining.is_zero() {
                break;
            }

            log::debug!(
                "Waiting for {} ({}s/{}s)",
                logical_name,
                (timeout - remaining).as_secs(),
                timeout.as_secs()
            );
            self.clock.sleep(remaining.min(self.poll_interval)).await;
        }

        Err(HarnessError::DeviceNotFound {
            name: logical_name.to_string(),
            waited_secs: self.clock.elapsed().saturating_sub(started).as_secs(),
        })
    }

    /// Runtime id of the first device in the ready state
    pub async fn first_ready_device(&self) -> Result<Option<String>> {
        Ok(self
            .list_raw()
            .await?
            .into_iter()
            .find(|(_, state)| state == READY_STATE)
            .map(|(runtime_id, _)| runtime_id))
    }
}

#[async_trait]
impl DeviceResolver for DeviceDiscovery {
    async fn resolve(&self, logical_name: Option<&str>, timeout: Duration) -> Result<String> {
        match logical_name {
            Some(name) => self.resolve_device_id(name, timeout).await,
            None => match self.first_ready_device().await {
                Ok(Some(runtime_id)) => Ok(runtime_id),
                Ok(None) => Err(HarnessError::DeviceNotFound {
                    name: "<any>".to_string(),
                    waited_secs: 0,
                }),
                Err(e) => {
                    log::warn!("Device listing failed: {}", e);
                    Err(HarnessError::DeviceNotFound {
                        name: "<any>".to_string(),
                        waited_secs: 0,
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::adb::fake::FakeAdb;
    use crate::utils::clock::ManualClock;

    const DEVICES: &str = "List of devices attached\n\
        emulator-5554          device product:sdk_gphone64_x86_64 model:sdk_gphone64_x86_64 device:emu64xa transport_id:1\n\
        emulator-5555          offline transport_id:2\n\
        \n";

    fn discovery(adb: FakeAdb) -> (DeviceDiscovery, Arc<FakeAdb>, Arc<ManualClock>) {
        let adb = Arc::new(adb);
        let clock = Arc::new(ManualClock::new());
        (
            DeviceDiscovery::new(adb.clone(), clock.clone()),
            adb,
            clock,
        )
    }

    #[test]
    fn test_parse_device_list() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      emulator-5554\tdevice\n\
                      R58M12345\tunauthorized usb:1-1\n\n";

        assert_eq!(
            parse_device_list(output),
            vec![
                ("emulator-5554".to_string(), "device".to_string()),
                ("R58M12345".to_string(), "unauthorized".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_avd_name() {
        assert_eq!(
            parse_avd_name("Pixel_9_API_36\r\nOK\r\n").as_deref(),
            Some("Pixel_9_API_36")
        );
        assert_eq!(parse_avd_name("\n  \n"), None);
        assert_eq!(parse_avd_name("OK\n"), None);
        assert_eq!(parse_avd_name("error: no emulator detected"), None);
    }

    #[test]
    fn test_unknown_never_matches() {
        let record = DeviceRecord {
            runtime_id: "R58M12345".to_string(),
            state: "device".to_string(),
            logical_name: None,
        };
        assert!(!record.matches("unknown"));
        assert_eq!(record.display_name(), UNKNOWN_NAME);
    }

    #[test]
    fn test_record_json_shape() {
        let record = DeviceRecord {
            runtime_id: "emulator-5554".to_string(),
            state: "device".to_string(),
            logical_name: Some("Pixel_9_API_36".to_string()),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["runtimeId"], "emulator-5554");
        assert_eq!(value["logicalName"], "Pixel_9_API_36");
        assert_eq!(value["state"], "device");
    }

    #[tokio::test]
    async fn test_resolves_within_one_poll() {
        let (discovery, adb, clock) = discovery(
            FakeAdb::new()
                .on("devices -l", DEVICES)
                .on("-s emulator-5554 emu avd name", "Pixel_9_API_36\r\nOK\r\n"),
        );

        let id = discovery
            .resolve_device_id("Pixel_9_API_36", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(id, "emulator-5554");
        assert_eq!(clock.sleep_count(), 0);
        assert!(clock.elapsed() <= POLL_INTERVAL);
        // offline devices are never asked for their name
        assert_eq!(adb.count("-s emulator-5555 emu avd name"), 0);
    }

    #[tokio::test]
    async fn test_match_is_case_insensitive() {
        let (discovery, _, _) = discovery(
            FakeAdb::new()
                .on("devices -l", DEVICES)
                .on("-s emulator-5554 emu avd name", "pixel_9\nOK\n"),
        );

        let id = discovery
            .resolve_device_id("Pixel_9", Duration::from_secs(4))
            .await
            .unwrap();
        assert_eq!(id, "emulator-5554");
    }

    #[tokio::test]
    async fn test_timeout_bound() {
        for timeout_secs in [0u64, 1, 9, 10] {
            let (discovery, _, clock) = discovery(
                FakeAdb::new()
                    .on("devices -l", DEVICES)
                    .on("-s emulator-5554 emu avd name", "Other_AVD\nOK\n"),
            );
            let timeout = Duration::from_secs(timeout_secs);

            let err = discovery
                .resolve_device_id("Pixel_9_API_36", timeout)
                .await
                .unwrap_err();

            assert!(matches!(err, HarnessError::DeviceNotFound { .. }));
            assert!(clock.elapsed() >= timeout, "returned early for {timeout_secs}s");
            assert!(
                clock.elapsed() <= timeout + POLL_INTERVAL,
                "returned late for {timeout_secs}s"
            );
        }
    }

    /// Every adb call costs `delay` of clock time
    struct SlowAdb {
        inner: FakeAdb,
        clock: Arc<ManualClock>,
        delay: Duration,
    }

    #[async_trait]
    impl AdbRunner for SlowAdb {
        async fn run(&self, args: &[&str]) -> Result<adb::CommandOutput> {
            self.clock.advance(self.delay);
            self.inner.run(args).await
        }
    }

    #[tokio::test]
    async fn test_timeout_bound_with_slow_adb() {
        for timeout_secs in [0u64, 1, 9, 10] {
            let clock = Arc::new(ManualClock::new());
            let adb = SlowAdb {
                inner: FakeAdb::new()
                    .on("devices -l", DEVICES)
                    .on("-s emulator-5554 emu avd name", "Other_AVD\nOK\n"),
                clock: clock.clone(),
                delay: Duration::from_millis(1500),
            };
            let discovery = DeviceDiscovery::new(Arc::new(adb), clock.clone());
            let timeout = Duration::from_secs(timeout_secs);

            let err = discovery
                .resolve_device_id("Pixel_9_API_36", timeout)
                .await
                .unwrap_err();

            assert!(matches!(err, HarnessError::DeviceNotFound { .. }));
            assert!(clock.elapsed() >= timeout, "returned early for {timeout_secs}s");
            assert!(
                clock.elapsed() <= timeout + POLL_INTERVAL,
                "returned at {:?} for {timeout_secs}s",
                clock.elapsed()
            );
        }
    }

    #[tokio::test]
    async fn test_slow_adb_still_resolves() {
        let clock = Arc::new(ManualClock::new());
        let adb = SlowAdb {
            inner: FakeAdb::new()
                .on("devices -l", DEVICES)
                .on("-s emulator-5554 emu avd name", "Pixel_9_API_36\nOK\n"),
            clock: clock.clone(),
            delay: Duration::from_millis(1500),
        };
        let discovery = DeviceDiscovery::new(Arc::new(adb), clock.clone());

        let id = discovery
            .resolve_device_id("Pixel_9_API_36", Duration::from_secs(4))
            .await
            .unwrap();
        assert_eq!(id, "emulator-5554");
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_zero_timeout_does_not_poll() {
        let (discovery, adb, clock) = discovery(FakeAdb::new().on("devices -l", DEVICES));

        let err = discovery
            .resolve_device_id("Pixel_9_API_36", Duration::ZERO)
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::DeviceNotFound { waited_secs: 0, .. }));
        assert_eq!(adb.count("devices -l"), 0);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_device_appears_on_later_poll() {
        let (discovery, adb, clock) = discovery(
            FakeAdb::new()
                .on_sequence(
                    "devices -l",
                    &["List of devices attached\n\n", "List of devices attached\n\n", DEVICES],
                )
                .on("-s emulator-5554 emu avd name", "Pixel_9_API_36\nOK\n"),
        );

        let id = discovery
            .resolve_device_id("Pixel_9_API_36", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(id, "emulator-5554");
        assert_eq!(adb.count("devices -l"), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_listing_failure_does_not_abort_loop() {
        let (discovery, adb, _) = discovery(
            FakeAdb::new()
                .on_launch_error("devices -l")
                .on("devices -l", DEVICES)
                .on("-s emulator-5554 emu avd name", "Pixel_9_API_36\nOK\n"),
        );

        let id = discovery
            .resolve_device_id("Pixel_9_API_36", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(id, "emulator-5554");
        assert_eq!(adb.count("devices -l"), 2);
    }

    #[tokio::test]
    async fn test_name_query_failure_records_unknown() {
        let (discovery, _, _) = discovery(
            FakeAdb::new()
                .on("devices -l", DEVICES)
                .on_failure("-s emulator-5554 emu avd name", "error: not an emulator"),
        );

        let devices = discovery.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].display_name(), UNKNOWN_NAME);
        assert!(devices[0].is_ready());
        assert!(!devices[1].is_ready());
    }

    #[tokio::test]
    async fn test_resolver_without_name_picks_first_ready() {
        let (discovery, _, _) = discovery(FakeAdb::new().on(
            "devices -l",
            "List of devices attached\nemulator-5556 offline\nemulator-5554 device\n",
        ));

        let id = discovery.resolve(None, Duration::from_secs(1)).await.unwrap();
        assert_eq!(id, "emulator-5554");
    }
}
