//! Automation sessions.
//!
//! A session is one live attachment of the Appium server to one device. The
//! [`SessionManager`] owns the only session of a suite; everything else
//! borrows a cloned [`SessionHandle`].

pub mod appium;
pub mod capabilities;
pub mod manager;
pub mod screenshot;

#[cfg(test)]
pub mod fake;

pub use appium::{AppiumFactory, AppiumSession};
pub use capabilities::SessionConfig;
pub use manager::{SessionManager, SessionState};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Operations the harness needs from a live session
#[async_trait]
pub trait AutomationSession: Send + Sync {
    fn id(&self) -> &str;

    /// Identity query. Any error means the session is gone.
    async fn ping(&self) -> Result<()>;

    /// End the session on the server
    async fn quit(&self) -> Result<()>;

    /// Bring an installed app to the foreground
    async fn activate_app(&self, app_id: &str) -> Result<()>;

    /// Package of the app currently in the foreground
    async fn current_package(&self) -> Result<String>;

    /// Screenshot of the device screen as PNG bytes
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

pub type SessionHandle = Arc<dyn AutomationSession>;

/// Creates sessions against an automation server
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, config: &SessionConfig) -> Result<SessionHandle>;
}

/// Liveness check that never fails
pub async fn is_alive(session: &dyn AutomationSession) -> bool {
    match session.ping().await {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Session {} is not alive: {}", session.id(), e);
            false
        }
    }
}
