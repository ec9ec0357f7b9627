use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.properties";
pub const CONFIG_PATH_ENV: &str = "DROIDSUITE_CONFIG";

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4723";
pub const DEFAULT_AUTOMATION_NAME: &str = "UiAutomator2";
pub const DEFAULT_DEVICE_WAIT_SECS: u64 = 60;

pub mod keys {
    pub const SERVER_URL: &str = "appium.server.url";
    pub const DEVICE_NAME: &str = "device.name";
    pub const APP_PACKAGE: &str = "app.package";
    pub const APP_ACTIVITY: &str = "app.activity";
    pub const AUTOMATION_NAME: &str = "automation.name";
    pub const NO_RESET: &str = "no.reset";
    pub const DEVICE_WAIT_SECS: &str = "device.wait.seconds";
    pub const REPORT_DIR: &str = "report.dir";
    pub const REPORT_FILENAME: &str = "report.filename";
}

/// Layered key/value configuration.
///
/// A key resolves from the environment first (`device.name` -> `DEVICE_NAME`),
/// then the properties file, then the caller's default. Blank values count as
/// missing at every layer.
#[derive(Debug, Clone, Default)]
pub struct Config {
    env: HashMap<String, String>,
    file: HashMap<String, String>,
    source: Option<PathBuf>,
}

impl Config {
    /// Load from the process environment and a properties file.
    ///
    /// A missing or unreadable file is not an error; the defaults apply.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let file = match std::fs::read_to_string(&path) {
            Ok(content) => {
                log::info!("Loaded config from: {}", path.display());
                parse_properties(&content)
            }
            Err(e) => {
                log::warn!(
                    "Could not read {} ({}). Using defaults.",
                    path.display(),
                    e
                );
                HashMap::new()
            }
        };

        Self {
            env: std::env::vars().collect(),
            file,
            source: Some(path),
        }
    }

    pub fn from_parts(env: HashMap<String, String>, file: HashMap<String, String>) -> Self {
        Self {
            env,
            file,
            source: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        non_blank(self.env.get(&env_key(key)))
            .or_else(|| non_blank(self.file.get(key)))
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Boolean lookup; only a case-insensitive "true" is true
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            Some(v) => v.parse().unwrap_or_else(|_| {
                log::warn!("Ignoring non-numeric value '{}' for {}", v, key);
                default
            }),
            None => default,
        }
    }

    pub fn server_url(&self) -> String {
        self.get_or(keys::SERVER_URL, DEFAULT_SERVER_URL)
    }

    pub fn device_name(&self) -> Option<String> {
        self.get(keys::DEVICE_NAME)
    }

    /// AVD the Appium server should boot, from `AVD_NAME` only
    pub fn avd_name(&self) -> Option<String> {
        non_blank(self.env.get("AVD_NAME"))
    }

    pub fn app_package(&self) -> Option<String> {
        self.get(keys::APP_PACKAGE)
    }

    pub fn app_activity(&self) -> Option<String> {
        self.get(keys::APP_ACTIVITY)
    }

    pub fn automation_name(&self) -> String {
        self.get_or(keys::AUTOMATION_NAME, DEFAULT_AUTOMATION_NAME)
    }

    pub fn no_reset(&self) -> bool {
        self.get_bool(keys::NO_RESET, true)
    }

    pub fn device_wait(&self) -> Duration {
        Duration::from_secs(self.get_u64(keys::DEVICE_WAIT_SECS, DEFAULT_DEVICE_WAIT_SECS))
    }

    pub fn report_dir(&self) -> Option<String> {
        self.get(keys::REPORT_DIR)
    }

    pub fn report_filename(&self) -> Option<String> {
        self.get(keys::REPORT_FILENAME)
    }
}

/// `app.package` -> `APP_PACKAGE`
pub fn env_key(key: &str) -> String {
    key.replace(['.', '-'], "_").to_uppercase()
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a Java-style `.properties` document.
///
/// Supports `key=value` and `key: value`, `#`/`!` comments, blank lines.
/// Later duplicates win.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let split_at = line.find(['=', ':']);
        let (key, value) = match split_at {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => (line, ""),
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        props.insert(key.to_string(), value.trim().to_string());
    }

    props
}
