//! Wire protocols for Trackbridge.
//!
//! This crate defines what a telemetry sample looks like inside the
//! bridge and how it becomes bytes for each destination platform:
//!
//! - **Types** ([`Record`], [`ProtocolName`]): the normalized sample and
//!   the closed set of destination protocols.
//! - **Builders** ([`FrameBuilder`] trait, [`Gt06Builder`],
//!   [`SuntechBuilder`]): pure encoders from a record plus
//!   [`ProtocolState`] to frames.
//! - **Errors** ([`EncodeError`]): why one record could not be encoded.
//!
//! # Architecture
//!
//! The protocol layer sits between the router (records) and the session
//! (sockets). It performs no I/O and holds no shared state.
//!
//! ```text
//! Router (Record) → Protocol (frames) → Session → Transport (bytes)
//! ```

mod builder;
mod encoding;
mod error;
mod gt06;
mod suntech;
mod types;

pub use builder::{BuilderOptions, Built, FrameBuilder, ProtocolState, builder_for};
pub use encoding::{crc_itu, digits_to_bcd, normalize_device_id};
pub use error::EncodeError;
pub use gt06::{Gt06Builder, Gt06LocationVariant};
pub use suntech::SuntechBuilder;
pub use types::{
    EXT_GPS_FIXED, EXT_IGNITION, EXT_SATELLITES, ProtocolName, Record, UnknownProtocol,
};
