use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::model::{Coordinate, LocationFix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location is currently unavailable")]
    Unavailable,

    #[error("timed out waiting for a location fix")]
    Timeout,
}

/// Platform location source. Delivers one best-effort fix per call and may
/// suspend until the platform permission prompt or the fix completes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<LocationFix, LocationError>;
}

/// Serves a fixed answer. Used by demo shells and tests.
#[derive(Debug)]
pub struct FixedLocationProvider {
    result: Result<LocationFix, LocationError>,
    calls: AtomicUsize,
}

impl FixedLocationProvider {
    pub fn new(fix: LocationFix) -> Self {
        Self {
            result: Ok(fix),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: LocationError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Edinburgh, Leith
    pub fn edinburgh() -> Self {
        Self::at(55.9701, -3.1894)
    }

    /// Wroclaw, Hiszpanska street
    pub fn wroclaw() -> Self {
        Self::at(51.1080, 17.0310)
    }

    /// Bangkok
    pub fn bangkok() -> Self {
        Self::at(13.7367, 100.5339)
    }

    fn at(lat: f64, lon: f64) -> Self {
        match Coordinate::new(lat, lon) {
            Ok(coordinate) => Self::new(LocationFix::new(coordinate)),
            Err(_) => Self::failing(LocationError::Unavailable),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_location(&self) -> Result<LocationFix, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
    }
}
