//! Core data types: the normalized telemetry record and protocol names.
//!
//! A [`Record`] is what every upstream source is mapped into before it
//! reaches the bridge. It is protocol-agnostic; builders turn it into the
//! bytes a specific tracking platform expects.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProtocolName
// ---------------------------------------------------------------------------

/// A destination wire protocol.
///
/// This is a closed set: each variant has exactly one builder (see
/// [`builder_for`](crate::builder_for)) and one destination address in
/// the configuration. The same value keys the session registry, so every
/// device assigned to `Gt06` shares one GT06 session.
///
/// `#[serde(rename_all = "lowercase")]` makes the names on disk and in the
/// assignment store `"gt06"` and `"suntech4g"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolName {
    /// Concox GT06-style binary protocol.
    Gt06,
    /// Suntech-style ASCII protocol (4G device family).
    Suntech4g,
}

impl ProtocolName {
    /// Every supported protocol, in a stable order.
    pub const ALL: [ProtocolName; 2] = [ProtocolName::Gt06, ProtocolName::Suntech4g];

    /// The key used in configuration files and the assignment store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt06 => "gt06",
            Self::Suntech4g => "suntech4g",
        }
    }
}

impl fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not in [`ProtocolName::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol {0:?}")]
pub struct UnknownProtocol(pub String);

impl FromStr for ProtocolName {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Assignment stores are edited by hand; accept any casing.
        match s.trim().to_ascii_lowercase().as_str() {
            "gt06" => Ok(Self::Gt06),
            "suntech4g" => Ok(Self::Suntech4g),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Extension key: number of satellites in view (integer).
pub const EXT_SATELLITES: &str = "satellites";
/// Extension key: whether the position is a GPS fix (bool, default true).
pub const EXT_GPS_FIXED: &str = "gps_fixed";
/// Extension key: ignition / ACC line state (bool, default true).
pub const EXT_IGNITION: &str = "ignition";

/// One normalized telemetry sample.
///
/// `device_id` and `timestamp` are always present. Every other reading is
/// an `Option`: `None` means "the source did not report it", which is a
/// different statement from `Some(0.0)`. Builders decide per protocol how
/// an unknown value is written (an empty ASCII field, a zero slot, or a
/// hard error when the field is required).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Upstream device identifier, as the source reported it.
    pub device_id: String,

    /// When the sample was taken (UTC).
    pub timestamp: DateTime<Utc>,

    /// Signed decimal degrees, north positive.
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Signed decimal degrees, east positive.
    #[serde(default)]
    pub longitude: Option<f64>,

    /// Ground speed in km/h.
    #[serde(default)]
    pub speed_kmh: Option<f64>,

    /// Course over ground, 0–359 degrees.
    #[serde(default)]
    pub heading: Option<u16>,

    /// External supply voltage in volts.
    #[serde(default)]
    pub voltage: Option<f64>,

    /// Total distance in meters.
    #[serde(default)]
    pub odometer_m: Option<f64>,

    /// Protocol-specific extras (see the `EXT_*` keys).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Creates a record with only the mandatory fields set.
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            latitude: None,
            longitude: None,
            speed_kmh: None,
            heading: None,
            voltage: None,
            odometer_m: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Sets latitude and longitude.
    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = Some(speed_kmh);
        self
    }

    pub fn with_heading(mut self, heading: u16) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_voltage(mut self, voltage: f64) -> Self {
        self.voltage = Some(voltage);
        self
    }

    pub fn with_odometer(mut self, odometer_m: f64) -> Self {
        self.odometer_m = Some(odometer_m);
        self
    }

    /// Sets an extension value.
    pub fn with_extension(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Reads a boolean extension. Non-boolean values count as absent.
    pub fn extension_bool(&self, key: &str) -> Option<bool> {
        self.extensions.get(key).and_then(serde_json::Value::as_bool)
    }

    /// Reads a non-negative integer extension.
    pub fn extension_u64(&self, key: &str) -> Option<u64> {
        self.extensions.get(key).and_then(serde_json::Value::as_u64)
    }
}
