//! Error types for the protocol layer.
//!
//! Each crate in Trackbridge defines its own error enum. When you see an
//! `EncodeError`, you know one record could not be turned into bytes;
//! nothing about the network or the session is implied.

/// Errors that can occur while building a frame.
///
/// An `EncodeError` is always local to the one record (or identity) being
/// encoded. The session drops that record and keeps its connection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// A field the frame cannot be built without is absent.
    ///
    /// For location frames that means latitude or longitude: a position
    /// report with no position has nothing to say.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but the protocol cannot represent its value,
    /// e.g. a latitude of 91 degrees or a speed that overflows one byte.
    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    /// The login/heartbeat identity has no digits to encode.
    #[error("invalid device identity: {0:?}")]
    InvalidIdentity(String),
}

impl EncodeError {
    pub(crate) fn out_of_range(field: &'static str, value: impl ToString) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
        }
    }
}
