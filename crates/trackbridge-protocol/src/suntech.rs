//! Suntech-style ASCII frames.
//!
//! Reports are `;`-separated text terminated by a carriage return. An
//! unknown optional reading is written as an empty field, which the
//! platform treats as "not reported". There is no login: the device id
//! travels in every frame.
//!
//! ```text
//! STT;id;model;sw;YYYYMMDD;HH:MM:SS;cell;lat;lon;spd;crs;sat;fix;odo;volt;io;mode;seq;hmeter;bckvolt;type\r
//! ALV;id\r
//! ```

use crate::builder::{Built, FrameBuilder, ProtocolState};
use crate::encoding::{self, normalize_device_id};
use crate::{EXT_GPS_FIXED, EXT_IGNITION, EXT_SATELLITES, EncodeError, ProtocolName, Record};

/// Suntech device ids are 10 digits.
pub const DEVICE_ID_DIGITS: usize = 10;

const MODEL: &str = "04";
const FIRMWARE: &str = "1.0.0";
const NO_CELL: &str = "00000000";
/// Report mode: idle-interval reporting.
const MODE_NORMAL: &str = "1";
/// Message type: real-time (not buffered).
const MSG_REALTIME: &str = "1";

/// The speed field is `000.000`.
const MAX_SPEED_KMH: f64 = 999.999;
/// Voltage is carried in centivolts within 16 bits.
const MAX_VOLTAGE: f64 = 655.35;

/// Builds Suntech frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuntechBuilder;

impl FrameBuilder for SuntechBuilder {
    fn protocol(&self) -> ProtocolName {
        ProtocolName::Suntech4g
    }

    fn requires_login(&self) -> bool {
        false
    }

    fn login(&self, _identity: &str, state: &ProtocolState) -> Result<Built, EncodeError> {
        Ok(Built {
            frames: Vec::new(),
            next: *state,
        })
    }

    fn location(&self, record: &Record, state: &ProtocolState) -> Result<Built, EncodeError> {
        let lat = encoding::coordinate(record.latitude, "latitude", 90.0)?;
        let lon = encoding::coordinate(record.longitude, "longitude", 180.0)?;
        let speed = encoding::bounded(record.speed_kmh, "speed_kmh", MAX_SPEED_KMH)?;
        let heading = encoding::heading(record.heading)?;
        let voltage = encoding::bounded(record.voltage, "voltage", MAX_VOLTAGE)?;
        let odometer = encoding::bounded(record.odometer_m, "odometer_m", f64::from(u32::MAX))?;

        let id = normalize_device_id(&record.device_id, DEVICE_ID_DIGITS);
        let ts = record.timestamp;
        let fixed = record.extension_bool(EXT_GPS_FIXED).unwrap_or(true);

        let fields: [String; 21] = [
            "STT".to_string(),
            id,
            MODEL.to_string(),
            FIRMWARE.to_string(),
            ts.format("%Y%m%d").to_string(),
            ts.format("%H:%M:%S").to_string(),
            NO_CELL.to_string(),
            format!("{lat:+010.6}"),
            format!("{lon:+011.6}"),
            optional(speed, |s| format!("{s:07.3}")),
            optional(heading, |h| format!("{:06.2}", f64::from(h))),
            optional(record.extension_u64(EXT_SATELLITES), |n| n.to_string()),
            u8::from(fixed).to_string(),
            optional(odometer, |m| format!("{}", m.round() as u64)),
            optional(voltage, |v| format!("{v:.2}")),
            optional(record.extension_bool(EXT_IGNITION), |on| {
                let io = if on { "100000" } else { "000000" };
                io.to_string()
            }),
            MODE_NORMAL.to_string(),
            format!("{:04}", state.serial % 10_000),
            String::new(), // hour meter
            String::new(), // backup battery
            MSG_REALTIME.to_string(),
        ];

        let mut frame = fields.join(";");
        frame.push('\r');
        Ok(Built::single(frame.into_bytes(), state))
    }

    fn heartbeat(&self, identity: &str, state: &ProtocolState) -> Result<Built, EncodeError> {
        if !identity.chars().any(|c| c.is_ascii_digit()) {
            return Err(EncodeError::InvalidIdentity(identity.to_string()));
        }
        let frame = format!("ALV;{}\r", normalize_device_id(identity, DEVICE_ID_DIGITS));
        Ok(Built::single(frame.into_bytes(), state))
    }
}

fn optional<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_default()
}
