//! The [`FrameBuilder`] trait and the static protocol → builder table.
//!
//! A builder is a pure function from a [`Record`] plus the session's
//! [`ProtocolState`] to bytes. It never mutates the state it is given:
//! the advanced counter comes back in [`Built::next`], and the session
//! decides whether to keep it (only after every frame was written).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::gt06::{Gt06Builder, Gt06LocationVariant};
use crate::suntech::SuntechBuilder;
use crate::{EncodeError, ProtocolName, Record};

/// Per-session protocol state that survives across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolState {
    /// Outgoing frame sequence number. Starts at 1 and wraps.
    pub serial: u16,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self { serial: 1 }
    }
}

impl ProtocolState {
    /// The state after `frames` serial numbers have been consumed.
    pub fn advanced(self, frames: u16) -> Self {
        Self {
            serial: self.serial.wrapping_add(frames),
        }
    }
}

/// The output of a builder: one or more frames and the state to adopt
/// once all of them are on the wire.
///
/// Each entry of `frames` is written with its own socket write; frames
/// are never concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Built {
    pub frames: Vec<Vec<u8>>,
    pub next: ProtocolState,
}

impl Built {
    /// A single frame consuming one serial number.
    pub fn single(frame: Vec<u8>, state: &ProtocolState) -> Self {
        Self {
            frames: vec![frame],
            next: state.advanced(1),
        }
    }

    /// Total bytes across all frames.
    pub fn len(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Encodes records into one destination protocol's frames.
///
/// ## Trait bounds
///
/// - `Send + Sync` → one builder is shared by the session and its
///   heartbeat task, which may run on different worker threads.
/// - `'static` → builders live for the whole process.
///
/// The trait is object-safe, so the registry can hold
/// `Arc<dyn FrameBuilder>` and adding a protocol never touches the
/// session or router code.
pub trait FrameBuilder: Send + Sync + 'static {
    /// Which protocol this builder speaks.
    fn protocol(&self) -> ProtocolName;

    /// Whether a login frame must precede data on every new connection.
    fn requires_login(&self) -> bool;

    /// Builds the login frame for `identity`.
    ///
    /// Protocols without a login return an empty [`Built`] that leaves
    /// the state unchanged.
    fn login(&self, identity: &str, state: &ProtocolState) -> Result<Built, EncodeError>;

    /// Builds the frame(s) carrying one position report.
    fn location(&self, record: &Record, state: &ProtocolState) -> Result<Built, EncodeError>;

    /// Builds a keep-alive frame.
    fn heartbeat(&self, identity: &str, state: &ProtocolState) -> Result<Built, EncodeError>;
}

/// Per-destination knobs that shape a builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderOptions {
    /// Which GT06 location layout to emit. Ignored by other protocols.
    #[serde(default)]
    pub gt06_location_variant: Gt06LocationVariant,
}

/// The static registration table: one builder per [`ProtocolName`].
pub fn builder_for(protocol: ProtocolName, options: &BuilderOptions) -> Arc<dyn FrameBuilder> {
    match protocol {
        ProtocolName::Gt06 => Arc::new(Gt06Builder::new(options.gt06_location_variant)),
        ProtocolName::Suntech4g => Arc::new(SuntechBuilder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_state_default_starts_at_one() {
        assert_eq!(ProtocolState::default().serial, 1);
    }

    #[test]
    fn test_protocol_state_advanced_wraps() {
        let state = ProtocolState { serial: u16::MAX };
        assert_eq!(state.advanced(1).serial, 0);
        assert_eq!(state.advanced(2).serial, 1);
    }

    #[test]
    fn test_builder_for_covers_every_protocol() {
        let options = BuilderOptions::default();
        for name in ProtocolName::ALL {
            assert_eq!(builder_for(name, &options).protocol(), name);
        }
    }

    #[test]
    fn test_builder_for_login_requirement() {
        let options = BuilderOptions::default();
        assert!(builder_for(ProtocolName::Gt06, &options).requires_login());
        assert!(!builder_for(ProtocolName::Suntech4g, &options).requires_login());
    }

    #[test]
    fn test_built_len_sums_frames() {
        let built = Built {
            frames: vec![vec![1, 2, 3], vec![4]],
            next: ProtocolState::default(),
        };
        assert_eq!(built.len(), 4);
        assert!(!built.is_empty());
    }
}
