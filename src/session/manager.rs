use super::{is_alive, SessionConfig, SessionFactory, SessionHandle};
use crate::driver::DeviceResolver;
use crate::error::Result;
use crate::utils::config::Config;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lifecycle of the managed session.
///
/// `Released` is terminal for the handle that was released; a later
/// `acquire` opens a brand-new session and moves back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Released,
}

struct Slot {
    handle: Option<SessionHandle>,
    state: SessionState,
}

/// Owns the single automation session of a suite.
///
/// Check, create and destroy all happen under one lock, so test classes
/// running in parallel never race to open or close the session.
pub struct SessionManager {
    resolver: Arc<dyn DeviceResolver>,
    factory: Arc<dyn SessionFactory>,
    slot: Mutex<Slot>,
}

impl SessionManager {
    pub fn new(resolver: Arc<dyn DeviceResolver>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            resolver,
            factory,
            slot: Mutex::new(Slot {
                handle: None,
                state: SessionState::Uninitialized,
            }),
        }
    }

    /// Return the live session, opening one if needed.
    ///
    /// A live session is returned as-is without touching device discovery.
    /// Otherwise the device is resolved (failure is fatal) and a new session
    /// is created from `config`.
    pub async fn acquire(&self, config: &Config) -> Result<SessionHandle> {
        let mut slot = self.slot.lock().await;

        if let Some(handle) = slot.handle.clone() {
            if is_alive(handle.as_ref()).await {
                log::info!("Reusing existing active session {}", handle.id());
                return Ok(handle);
            }
            log::warn!("Session {} is no longer alive; opening a new one", handle.id());
            slot.handle = None;
            slot.state = SessionState::Released;
        }

        let logical_name = config.device_name().or_else(|| config.avd_name());
        let runtime_id = self
            .resolver
            .resolve(logical_name.as_deref(), config.device_wait())
            .await?;

        let session_config = SessionConfig::from_config(config, logical_name.as_deref(), &runtime_id);
        let handle = self.factory.create(&session_config).await?;

        slot.handle = Some(handle.clone());
        slot.state = SessionState::Active;
        Ok(handle)
    }

    /// The held session, alive or not
    pub async fn current(&self) -> Option<SessionHandle> {
        self.slot.lock().await.handle.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.slot.lock().await.state
    }

    /// Whether a session is held and answers its identity query
    pub async fn is_active(&self) -> bool {
        let handle = self.current().await;
        match handle {
            Some(handle) => is_alive(handle.as_ref()).await,
            None => false,
        }
    }

    /// Quit the held session and clear the slot.
    ///
    /// Returns `Ok(false)` when there was nothing to release. The slot is
    /// cleared even when the server rejects the quit; that error is returned.
    pub async fn release(&self) -> Result<bool> {
        let mut slot = self.slot.lock().await;

        let Some(handle) = slot.handle.take() else {
            return Ok(false);
        };
        slot.state = SessionState::Released;

        handle.quit().await?;
        log::info!("Session {} quit", handle.id());
        Ok(true)
    }

    /// Release only a live session. A dead one is dropped without a quit
    /// call.
    pub async fn release_if_alive(&self) -> Result<bool> {
        let mut slot = self.slot.lock().await;

        let Some(handle) = slot.handle.take() else {
            return Ok(false);
        };
        slot.state = SessionState::Released;

        if !is_alive(handle.as_ref()).await {
            log::info!("Session {} already ended", handle.id());
            return Ok(false);
        }

        handle.quit().await?;
        log::info!("Session {} quit", handle.id());
        Ok(true)
    }
}
