use crate::utils::config::Config;
use serde_json::{json, Map, Value};

/// Everything needed to open a session on one resolved device
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub server_url: String,
    pub device_name: String,
    pub udid: String,
    pub app_package: Option<String>,
    pub app_activity: Option<String>,
    pub automation_name: String,
    pub no_reset: bool,
    /// AVD the server should boot if it is not running
    pub avd: Option<String>,
}

impl SessionConfig {
    /// Build from layered configuration and the runtime id discovery found.
    ///
    /// The device name is the logical name when one was configured, else the
    /// runtime id.
    pub fn from_config(config: &Config, logical_name: Option<&str>, runtime_id: &str) -> Self {
        Self {
            server_url: config.server_url().trim_end_matches('/').to_string(),
            device_name: logical_name.unwrap_or(runtime_id).to_string(),
            udid: runtime_id.to_string(),
            app_package: config.app_package(),
            app_activity: config.app_activity(),
            automation_name: config.automation_name(),
            no_reset: config.no_reset(),
            avd: config.avd_name(),
        }
    }

    /// W3C new-session payload with `appium:` vendor prefixes
    pub fn capabilities(&self) -> Value {
        let mut caps = Map::new();
        caps.insert("platformName".into(), json!("Android"));
        caps.insert("appium:automationName".into(), json!(self.automation_name));
        caps.insert("appium:deviceName".into(), json!(self.device_name));
        caps.insert("appium:udid".into(), json!(self.udid));
        caps.insert("appium:noReset".into(), json!(self.no_reset));

        if let Some(ref package) = self.app_package {
            caps.insert("appium:appPackage".into(), json!(package));
        }
        if let Some(ref activity) = self.app_activity {
            caps.insert("appium:appActivity".into(), json!(activity));
        }
        if let Some(ref avd) = self.avd {
            caps.insert("appium:avd".into(), json!(avd));
        }

        json!({
            "capabilities": {
                "alwaysMatch": caps,
                "firstMatch": [{}]
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::parse_properties;
    use std::collections::HashMap;

    #[test]
    fn test_from_config_defaults() {
        let cfg = Config::from_parts(
            HashMap::new(),
            parse_properties("appium.server.url=http://10.0.2.2:4723/\napp.package=com.example.app"),
        );

        let session = SessionConfig::from_config(&cfg, None, "emulator-5554");

        assert_eq!(session.server_url, "http://10.0.2.2:4723");
        assert_eq!(session.device_name, "emulator-5554");
        assert_eq!(session.udid, "emulator-5554");
        assert_eq!(session.automation_name, "UiAutomator2");
        assert!(session.no_reset);
        assert_eq!(session.app_activity, None);
    }

    #[test]
    fn test_capabilities_payload() {
        let env: HashMap<String, String> =
            [("AVD_NAME".to_string(), "Pixel_9_API_36".to_string())].into();
        let cfg = Config::from_parts(
            env,
            parse_properties("app.package=com.example.app\napp.activity=.MainActivity\nno.reset=false"),
        );

        let caps = SessionConfig::from_config(&cfg, Some("Pixel_9_API_36"), "emulator-5554")
            .capabilities();
        let always = &caps["capabilities"]["alwaysMatch"];

        assert_eq!(always["platformName"], "Android");
        assert_eq!(always["appium:deviceName"], "Pixel_9_API_36");
        assert_eq!(always["appium:udid"], "emulator-5554");
        assert_eq!(always["appium:appPackage"], "com.example.app");
        assert_eq!(always["appium:appActivity"], ".MainActivity");
        assert_eq!(always["appium:noReset"], false);
        assert_eq!(always["appium:avd"], "Pixel_9_API_36");
    }
}
