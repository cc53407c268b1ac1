use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionKind {
    Location,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Restricted,
    NotDetermined,
}

impl PermissionStatus {
    /// Only an explicit grant counts; restricted and undecided are refusals.
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// Platform permission gate. `request` may show the system dialog and
/// resolves once the user (or policy) has decided.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request(&self, kind: PermissionKind) -> PermissionStatus;
}

/// Answers from a fixed table; kinds not in the table are granted.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionGate {
    statuses: HashMap<PermissionKind, PermissionStatus>,
}

impl StaticPermissionGate {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: PermissionKind, status: PermissionStatus) -> Self {
        self.statuses.insert(kind, status);
        self
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn request(&self, kind: PermissionKind) -> PermissionStatus {
        self.statuses
            .get(&kind)
            .copied()
            .unwrap_or(PermissionStatus::Granted)
    }
}
