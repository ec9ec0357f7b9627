//! In-memory sessions and resolvers for unit tests.

use super::{AutomationSession, SessionConfig, SessionFactory, SessionHandle};
use crate::driver::DeviceResolver;
use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 4x4 red PNG
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

pub struct FakeSession {
    id: String,
    pub alive: AtomicBool,
    pub quits: AtomicUsize,
    pub screenshots: AtomicUsize,
    pub activations: Mutex<Vec<String>>,
    pub fail_activate: AtomicBool,
    pub fail_screenshot: AtomicBool,
    pub fail_quit: AtomicBool,
    pub package: Mutex<String>,
}

impl FakeSession {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            alive: AtomicBool::new(true),
            quits: AtomicUsize::new(0),
            screenshots: AtomicUsize::new(0),
            activations: Mutex::new(Vec::new()),
            fail_activate: AtomicBool::new(false),
            fail_screenshot: AtomicBool::new(false),
            fail_quit: AtomicBool::new(false),
            package: Mutex::new("com.example.app".to_string()),
        }
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl AutomationSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ping(&self) -> Result<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HarnessError::Session("invalid session id".into()))
        }
    }

    async fn quit(&self) -> Result<()> {
        self.quits.fetch_add(1, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
        if self.fail_quit.load(Ordering::SeqCst) {
            return Err(HarnessError::Session("quit failed".into()));
        }
        Ok(())
    }

    async fn activate_app(&self, app_id: &str) -> Result<()> {
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(HarnessError::Session("activate failed".into()));
        }
        self.activations.lock().unwrap().push(app_id.to_string());
        Ok(())
    }

    async fn current_package(&self) -> Result<String> {
        self.ping().await?;
        Ok(self.package.lock().unwrap().clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        if self.fail_screenshot.load(Ordering::SeqCst) {
            return Err(HarnessError::Session("screenshot failed".into()));
        }
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(png_bytes())
    }
}

/// Hands out `FakeSession`s and remembers them
#[derive(Default)]
pub struct FakeFactory {
    pub created: Mutex<Vec<Arc<FakeSession>>>,
    pub configs: Mutex<Vec<SessionConfig>>,
    pub fail: AtomicBool,
}

impl FakeFactory {
    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<FakeSession> {
        self.created.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self, config: &SessionConfig) -> Result<SessionHandle> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HarnessError::Session("server unreachable".into()));
        }
        let mut created = self.created.lock().unwrap();
        let session = Arc::new(FakeSession::new(&format!("session-{}", created.len() + 1)));
        created.push(session.clone());
        self.configs.lock().unwrap().push(config.clone());
        Ok(session)
    }
}

/// Resolves every name to one runtime id, or to nothing
pub struct FakeResolver {
    runtime_id: Option<String>,
    pub calls: AtomicUsize,
    pub names: Mutex<Vec<Option<String>>>,
}

impl FakeResolver {
    pub fn found(runtime_id: &str) -> Self {
        Self {
            runtime_id: Some(runtime_id.to_string()),
            calls: AtomicUsize::new(0),
            names: Mutex::new(Vec::new()),
        }
    }

    pub fn missing() -> Self {
        Self {
            runtime_id: None,
            calls: AtomicUsize::new(0),
            names: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceResolver for FakeResolver {
    async fn resolve(&self, logical_name: Option<&str>, timeout: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.names
            .lock()
            .unwrap()
            .push(logical_name.map(str::to_string));
        self.runtime_id
            .clone()
            .ok_or_else(|| HarnessError::DeviceNotFound {
                name: logical_name.unwrap_or("<any>").to_string(),
                waited_secs: timeout.as_secs(),
            })
    }
}
