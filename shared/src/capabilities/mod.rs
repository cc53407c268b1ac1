//! Seams to the platform shell and remote services.
//!
//! Each collaborator is an awaitable trait object injected into the
//! orchestrator; the shell supplies the platform-backed implementations.

mod config;
mod location;
mod permission;

pub use self::config::{
    ConfigError, ConfigProvider, RemoteConfigClient, StaticConfigProvider,
    ThrottledConfigProvider, API_KEY_ENTRY, MIN_REFETCH_INTERVAL,
};
pub use self::location::{FixedLocationProvider, LocationError, LocationProvider};
pub use self::permission::{
    PermissionGate, PermissionKind, PermissionStatus, StaticPermissionGate,
};

use std::sync::Arc;

use crate::generative::GenerativeModel;

/// Everything the orchestrator talks to, constructed by the shell.
#[derive(Clone)]
pub struct Capabilities {
    pub location: Arc<dyn LocationProvider>,
    pub config: Arc<dyn ConfigProvider>,
    pub generator: Arc<dyn GenerativeModel>,
    pub permissions: Arc<dyn PermissionGate>,
}

impl Capabilities {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        config: Arc<dyn ConfigProvider>,
        generator: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            location,
            config,
            generator,
            permissions: Arc::new(StaticPermissionGate::allow_all()),
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionGate>) -> Self {
        self.permissions = permissions;
        self
    }
}
