//! Appium (W3C WebDriver) HTTP client
//!
//! Only the endpoints the harness needs: session create/get/delete, app
//! activation, foreground package and screenshots.

use super::{AutomationSession, SessionConfig, SessionFactory, SessionHandle};
use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for ordinary commands
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Session creation installs the UiAutomator2 server on first use, which is slow
const CREATE_TIMEOUT: Duration = Duration::from_secs(300);

/// W3C response envelope
#[derive(Debug, Deserialize)]
struct WebDriverResponse<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Legacy (JSONWP) servers put the id at the top level
#[derive(Debug, Deserialize)]
struct NewSessionResponse {
    value: Option<NewSessionValue>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebDriverError {
    error: Option<String>,
    message: Option<String>,
}

/// One live Appium session
pub struct AppiumSession {
    base_url: String,
    client: reqwest::Client,
    session_id: String,
}

impl AppiumSession {
    fn http_client() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()
            .map_err(HarnessError::session)
    }

    /// Open a new session on the server named in `config`
    pub async fn create(config: &SessionConfig) -> Result<Self> {
        let client = Self::http_client()?;
        let base_url = config.server_url.trim_end_matches('/').to_string();
        let url = format!("{}/session", base_url);

        let resp = client
            .post(&url)
            .timeout(CREATE_TIMEOUT)
            .json(&config.capabilities())
            .send()
            .await
            .map_err(|e| HarnessError::Session(format!("Failed to reach {}: {}", url, e)))?;

        let body = check_status(resp).await?;
        let parsed: NewSessionResponse = serde_json::from_value(body)
            .map_err(|e| HarnessError::Session(format!("Failed to parse session response: {}", e)))?;

        let session_id = parsed
            .value
            .and_then(|v| v.session_id)
            .or(parsed.session_id)
            .ok_or_else(|| HarnessError::Session("No session ID in response".to_string()))?;

        Ok(Self {
            base_url,
            client,
            session_id,
        })
    }

    /// Attach to an existing session without creating one
    pub fn attach(server_url: &str, session_id: &str) -> Result<Self> {
        Ok(Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            client: Self::http_client()?,
            session_id: session_id.to_string(),
        })
    }

    fn session_url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/session/{}", self.base_url, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.base_url, self.session_id, path)
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let resp = self
            .client
            .get(self.session_url(path))
            .send()
            .await
            .map_err(HarnessError::session)?;
        check_status(resp).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let resp = self
            .client
            .post(self.session_url(path))
            .json(body)
            .send()
            .await
            .map_err(HarnessError::session)?;
        check_status(resp).await
    }

    async fn value<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get(path).await?;
        let response: WebDriverResponse<T> =
            serde_json::from_value(body).map_err(HarnessError::session)?;
        Ok(response.value)
    }
}

/// Turn a non-2xx response into an error carrying the WebDriver message
async fn check_status(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(body);
    }

    let detail = serde_json::from_value::<WebDriverResponse<WebDriverError>>(body.clone())
        .ok()
        .map(|r| {
            format!(
                "{}: {}",
                r.value.error.unwrap_or_else(|| "unknown error".to_string()),
                r.value.message.unwrap_or_default()
            )
        })
        .unwrap_or_else(|| body.to_string());

    Err(HarnessError::Session(format!("HTTP {}: {}", status, detail)))
}

#[async_trait]
impl AutomationSession for AppiumSession {
    fn id(&self) -> &str {
        &self.session_id
    }

    async fn ping(&self) -> Result<()> {
        self.get("").await.map(|_| ())
    }

    async fn quit(&self) -> Result<()> {
        let resp = self
            .client
            .delete(self.session_url(""))
            .send()
            .await
            .map_err(HarnessError::session)?;
        check_status(resp).await.map(|_| ())
    }

    async fn activate_app(&self, app_id: &str) -> Result<()> {
        self.post(
            "appium/device/activate_app",
            &serde_json::json!({ "appId": app_id }),
        )
        .await
        .map(|_| ())
    }

    async fn current_package(&self) -> Result<String> {
        self.value("appium/device/current_package").await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let encoded: String = self.value("screenshot").await?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.replace(['\n', '\r'], ""))
            .map_err(|e| HarnessError::Session(format!("Failed to decode screenshot: {}", e)))
    }
}

/// Opens real Appium sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct AppiumFactory;

#[async_trait]
impl SessionFactory for AppiumFactory {
    async fn create(&self, config: &SessionConfig) -> Result<SessionHandle> {
        log::info!("Starting Appium session:");
        log::info!("  Server URL: {}", config.server_url);
        log::info!("  Device: {} ({})", config.device_name, config.udid);
        if let Some(ref avd) = config.avd {
            log::info!("  AVD to launch: {}", avd);
        }
        if let Some(ref package) = config.app_package {
            log::info!("  App Package: {}", package);
        }
        if let Some(ref activity) = config.app_activity {
            log::info!("  App Activity: {}", activity);
        }

        let session = AppiumSession::create(config).await?;
        log::info!("Session started: {}", session.id());
        Ok(Arc::new(session))
    }
}
