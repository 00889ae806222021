//! GT06-style binary frames.
//!
//! Every frame has the same envelope:
//!
//! ```text
//! 78 78 | len:u8 | proto:u8 | body | serial:u16 | crc:u16 | 0D 0A
//! ```
//!
//! `len` counts proto + body + serial + crc, and the CRC covers
//! `len..=serial`. The information frame (0x94) uses the extended
//! `79 79` start with a two-byte length. All integers are big-endian.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::builder::{Built, FrameBuilder, ProtocolState};
use crate::encoding::{self, crc_itu, digits_to_bcd, normalize_device_id};
use crate::{EXT_GPS_FIXED, EXT_IGNITION, EXT_SATELLITES, EncodeError, ProtocolName, Record};

const START: [u8; 2] = [0x78, 0x78];
const START_EXTENDED: [u8; 2] = [0x79, 0x79];
const STOP: [u8; 2] = [0x0D, 0x0A];

const PROTO_LOGIN: u8 = 0x01;
const PROTO_HEARTBEAT: u8 = 0x13;
const PROTO_INFORMATION: u8 = 0x94;

/// Information sub-protocol carrying external voltage.
const INFO_EXTERNAL_VOLTAGE: u8 = 0x00;

/// GT06 IMEIs are 15 digits.
pub const IMEI_DIGITS: usize = 15;

/// Coordinates are sent as degrees × 1 800 000 (i.e. 1/500 arc-second).
const COORD_SCALE: f64 = 1_800_000.0;

/// Largest reportable speed: the field is one byte of km/h.
const MAX_SPEED_KMH: f64 = 255.0;

/// Voltage is hundredths of a volt in a u16.
const MAX_VOLTAGE: f64 = 655.35;

/// Which location layout (protocol number) to emit.
///
/// They share the GPS block and differ in the LBS/status tail. Only
/// `0x32` and `0xA0` have a voltage slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gt06LocationVariant {
    #[serde(rename = "12")]
    X12,
    #[serde(rename = "22")]
    X22,
    #[serde(rename = "32")]
    X32,
    #[default]
    #[serde(rename = "a0", alias = "A0")]
    XA0,
}

impl Gt06LocationVariant {
    /// The protocol-number byte for this layout.
    pub fn protocol_number(self) -> u8 {
        match self {
            Self::X12 => 0x12,
            Self::X22 => 0x22,
            Self::X32 => 0x32,
            Self::XA0 => 0xA0,
        }
    }

    fn has_voltage_slot(self) -> bool {
        matches!(self, Self::X32 | Self::XA0)
    }
}

/// Builds GT06 frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gt06Builder {
    variant: Gt06LocationVariant,
}

impl Gt06Builder {
    pub fn new(variant: Gt06LocationVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> Gt06LocationVariant {
        self.variant
    }

    /// Builds the 0x94/0x00 external-voltage information frame.
    pub fn voltage_info(&self, voltage: f64, serial: u16) -> Result<Vec<u8>, EncodeError> {
        let volts = encoding::bounded(Some(voltage), "voltage", MAX_VOLTAGE)?.unwrap_or(0.0);

        let mut body = Vec::with_capacity(3);
        body.push(INFO_EXTERNAL_VOLTAGE);
        body.extend_from_slice(&centivolts(volts).to_be_bytes());

        Ok(extended_frame(PROTO_INFORMATION, &body, serial))
    }

    fn location_body(&self, record: &Record) -> Result<Vec<u8>, EncodeError> {
        let lat = encoding::coordinate(record.latitude, "latitude", 90.0)?;
        let lon = encoding::coordinate(record.longitude, "longitude", 180.0)?;
        let speed = encoding::bounded(record.speed_kmh, "speed_kmh", MAX_SPEED_KMH)?;
        let heading = encoding::heading(record.heading)?;
        let voltage = encoding::bounded(record.voltage, "voltage", MAX_VOLTAGE)?;
        let odometer = encoding::bounded(record.odometer_m, "odometer_m", f64::from(u32::MAX))?;

        let ts = record.timestamp;
        let satellites = record.extension_u64(EXT_SATELLITES).unwrap_or(0).min(15) as u8;
        let fixed = record.extension_bool(EXT_GPS_FIXED).unwrap_or(true);
        let acc = record.extension_bool(EXT_IGNITION).unwrap_or(true);

        let mut body = Vec::with_capacity(48);

        // Date and time, one byte each, year without century.
        body.extend_from_slice(&[
            (ts.year() % 100) as u8,
            ts.month() as u8,
            ts.day() as u8,
            ts.hour() as u8,
            ts.minute() as u8,
            ts.second() as u8,
        ]);

        // High nibble: GPS info length (12). Low nibble: satellites.
        body.push(0xC0 | satellites);

        body.extend_from_slice(&scaled_coordinate(lat).to_be_bytes());
        body.extend_from_slice(&scaled_coordinate(lon).to_be_bytes());
        body.push(speed.map_or(0, |s| s.round() as u8));

        // Course/status: bit 12 fix, bit 11 west, bit 10 north, 0..9 course.
        let course_status: u16 = (u16::from(fixed) << 12)
            | (u16::from(lon < 0.0) << 11)
            | (u16::from(lat >= 0.0) << 10)
            | (heading.unwrap_or(0) & 0x03FF);
        body.extend_from_slice(&course_status.to_be_bytes());

        let mileage = odometer.map_or(0, |m| m.round() as u32);
        let volts_raw = voltage.map_or(0, centivolts);

        // LBS (MCC/MNC/LAC/cell) is not reported: zero-filled at each width.
        match self.variant {
            Gt06LocationVariant::X12 => {
                body.extend_from_slice(&[0; 2 + 1 + 2 + 3]);
            }
            Gt06LocationVariant::X22 => {
                body.extend_from_slice(&[0; 2 + 1 + 2 + 3]);
                push_status_tail(&mut body, acc, mileage);
            }
            Gt06LocationVariant::X32 => {
                body.extend_from_slice(&[0; 2 + 1 + 2 + 4]);
                push_status_tail(&mut body, acc, mileage);
                body.extend_from_slice(&volts_raw.to_be_bytes());
                body.extend_from_slice(&[0; 6]);
            }
            Gt06LocationVariant::XA0 => {
                body.extend_from_slice(&[0; 2 + 2 + 4 + 8]);
                push_status_tail(&mut body, acc, mileage);
                body.extend_from_slice(&volts_raw.to_be_bytes());
            }
        }

        Ok(body)
    }
}

impl FrameBuilder for Gt06Builder {
    fn protocol(&self) -> ProtocolName {
        ProtocolName::Gt06
    }

    fn requires_login(&self) -> bool {
        true
    }

    fn login(&self, identity: &str, state: &ProtocolState) -> Result<Built, EncodeError> {
        // Zero-padding a digitless identity would log in as IMEI 0.
        if !identity.chars().any(|c| c.is_ascii_digit()) {
            return Err(EncodeError::InvalidIdentity(identity.to_string()));
        }
        let imei = normalize_device_id(identity, IMEI_DIGITS);
        let body = digits_to_bcd(&imei)?;
        Ok(Built::single(frame(PROTO_LOGIN, &body, state.serial), state))
    }

    fn location(&self, record: &Record, state: &ProtocolState) -> Result<Built, EncodeError> {
        let body = self.location_body(record)?;
        let mut frames = vec![frame(self.variant.protocol_number(), &body, state.serial)];

        // Layouts without a voltage slot carry it in a follow-up frame.
        match record.voltage {
            Some(voltage) if !self.variant.has_voltage_slot() => {
                let serial = state.advanced(1).serial;
                frames.push(self.voltage_info(voltage, serial)?);
            }
            _ => {}
        }

        let next = state.advanced(frames.len() as u16);
        Ok(Built { frames, next })
    }

    fn heartbeat(&self, _identity: &str, state: &ProtocolState) -> Result<Built, EncodeError> {
        let acc = 1u8;
        // Bit 6 GPS tracking on, bit 2 charging, bit 1 ACC, bit 0 defence.
        let terminal_info = 0x40 | 0x04 | (acc << 1) | 0x01;
        let body = [
            terminal_info,
            0x06, // voltage level: very high
            0x04, // GSM signal: strong
            0x00, // alarm: none
            0x02, // language: English
        ];
        Ok(Built::single(frame(PROTO_HEARTBEAT, &body, state.serial), state))
    }
}

fn push_status_tail(body: &mut Vec<u8>, acc: bool, mileage: u32) {
    body.push(u8::from(acc));
    body.push(0x00); // upload mode: timed
    body.push(0x00); // real-time position
    body.extend_from_slice(&mileage.to_be_bytes());
}

fn scaled_coordinate(degrees: f64) -> u32 {
    (degrees.abs() * COORD_SCALE).round() as u32
}

fn centivolts(volts: f64) -> u16 {
    (volts * 100.0).round() as u16
}

/// Wraps a body in the standard `78 78` envelope.
fn frame(protocol: u8, body: &[u8], serial: u16) -> Vec<u8> {
    // proto + body + serial + crc
    let len = (1 + body.len() + 2 + 2) as u8;

    let mut out = Vec::with_capacity(body.len() + 10);
    out.extend_from_slice(&START);
    out.push(len);
    out.push(protocol);
    out.extend_from_slice(body);
    out.extend_from_slice(&serial.to_be_bytes());

    let crc = crc_itu(&out[2..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&STOP);
    out
}

/// Wraps a body in the extended `79 79` envelope (two-byte length).
fn extended_frame(protocol: u8, body: &[u8], serial: u16) -> Vec<u8> {
    let len = (1 + body.len() + 2 + 2) as u16;

    let mut out = Vec::with_capacity(body.len() + 11);
    out.extend_from_slice(&START_EXTENDED);
    out.extend_from_slice(&len.to_be_bytes());
    out.push(protocol);
    out.extend_from_slice(body);
    out.extend_from_slice(&serial.to_be_bytes());

    let crc = crc_itu(&out[2..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&STOP);
    out
}
