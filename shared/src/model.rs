use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use thiserror::Error;

use crate::capabilities::ConfigError;

pub const LOCATION_PLACEHOLDER_TEXT: &str = "Looking for your physical location by GPS...";

/// Category of question the user picked in the UI.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Initial,
    History,
    Restaurants,
    TouristSpots,
    Safety,
    Custom,
    Photo,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::Initial,
        Intent::History,
        Intent::Restaurants,
        Intent::TouristSpots,
        Intent::Safety,
        Intent::Custom,
        Intent::Photo,
    ];

    /// Whether the template carries a `{prompt}` placeholder.
    pub fn takes_free_text(self) -> bool {
        matches!(self, Intent::Custom | Intent::Photo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("coordinate components must be finite")]
    NotFinite,
}

/// Validated lat/lon
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Text substituted into prompts, e.g. `Latitude: 51.5, Longitude: -0.1.`
    pub fn prompt_text(&self) -> String {
        format!(
            "Latitude: {}, Longitude: {}.",
            decimal(self.lat),
            decimal(self.lon)
        )
    }
}

// Shortest round-trip form, but never without a fractional part.
fn decimal(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

/// A single best-effort fix delivered by the platform.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    /// Meters above sea level, when the platform reports it.
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters; negative means invalid.
    pub horizontal_accuracy: Option<f64>,
}

impl LocationFix {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            altitude: None,
            horizontal_accuracy: None,
        }
    }

    pub fn with_altitude(mut self, meters: f64) -> Self {
        self.altitude = Some(meters);
        self
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.horizontal_accuracy = Some(meters);
        self
    }

    /// Multi-line readout shown under "Your Location".
    pub fn detailed_text(&self) -> String {
        let mut details = format!(
            "• Latitude: {:.4}\n• Longitude: {:.4}\n",
            self.coordinate.lat, self.coordinate.lon
        );
        if let Some(altitude) = self.altitude.filter(|a| *a != 0.0) {
            details.push_str(&format!("• Altitude: {altitude:.2} meters\n"));
        }
        if let Some(accuracy) = self.horizontal_accuracy.filter(|a| *a >= 0.0) {
            details.push_str(&format!("• Accuracy: {accuracy:.2} meters"));
        }
        details
    }
}

/// Resolved location for one request. Never mixes sources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LocationSpec {
    Coordinates(Coordinate),
    Place(String),
}

impl LocationSpec {
    pub fn prompt_text(&self) -> String {
        match self {
            LocationSpec::Coordinates(coordinate) => coordinate.prompt_text(),
            LocationSpec::Place(place) => place.clone(),
        }
    }
}

/// Raw image bytes tagged with a sniffed MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    bytes: Bytes,
    mime_type: &'static str,
}

impl Photo {
    pub const FALLBACK_MIME_TYPE: &'static str = "image/png";

    pub fn new(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let mime_type = sniff_mime_type(&bytes).unwrap_or(Self::FALLBACK_MIME_TYPE);
        Self { bytes, mime_type }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if brand == b"heic" || brand == b"heix" || brand == b"mif1" {
            return Some("image/heic");
        }
    }
    None
}

/// What the UI hands over for one user action.
#[derive(Clone, Debug, PartialEq)]
pub struct SendPrompt {
    pub intent: Intent,
    pub free_text: Option<String>,
    pub photo: Option<Photo>,
    pub manual_location: Option<String>,
}

impl SendPrompt {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            free_text: None,
            photo: None,
            manual_location: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.free_text = Some(text.into());
        self
    }

    pub fn with_photo(mut self, photo: Photo) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn with_manual_location(mut self, location: impl Into<String>) -> Self {
        self.manual_location = Some(location.into());
        self
    }

    /// Manual text wins over GPS, but only when it has content.
    pub fn manual_location(&self) -> Option<&str> {
        self.manual_location
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// A request after its location has been resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptRequest {
    pub intent: Intent,
    pub location: LocationSpec,
    pub free_text: Option<String>,
    pub photo: Option<Photo>,
}

impl PromptRequest {
    pub fn from_command(command: SendPrompt, location: LocationSpec) -> Self {
        Self {
            intent: command.intent,
            location,
            free_text: command.free_text,
            photo: command.photo,
        }
    }
}

/// Secret for the generative endpoint. Debug output is redacted.
#[derive(Clone)]
pub struct ApiCredential(Arc<SecretString>);

impl ApiCredential {
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        Ok(Self(Arc::new(SecretString::new(key))))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential([REDACTED])")
    }
}

/// UI-observable lifecycle of the latest request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    #[default]
    Initial,
    Loading,
    Success(String),
    Error(String),
}

impl RequestState {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }
}

/// Everything the orchestrator publishes. Single writer: the orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub request: RequestState,
    pub location_text: String,
    /// Ticket of the newest request; writes from older tickets are dropped.
    pub active_ticket: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            request: RequestState::Initial,
            location_text: LOCATION_PLACEHOLDER_TEXT.to_string(),
            active_ticket: 0,
        }
    }
}
