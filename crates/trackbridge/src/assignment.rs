//! Which protocol each device reports through.
//!
//! The real store is external (a key-value service); the router only needs
//! the read side, expressed as [`AssignmentStore`]. [`InMemoryAssignments`]
//! is the in-process implementation used by the demo binary and the tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use trackbridge_protocol::ProtocolName;

/// The assignment store could not answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("assignment store unavailable: {0}")]
pub struct AssignmentError(pub String);

/// Read-only lookup of a device's destination protocol.
pub trait AssignmentStore: Send + Sync + 'static {
    /// `Ok(None)` means the device has no entry; the router then falls
    /// back to its default protocol.
    fn assigned_protocol(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<Option<ProtocolName>, AssignmentError>> + Send;
}

/// A process-local assignment table.
#[derive(Debug, Default)]
pub struct InMemoryAssignments {
    entries: RwLock<HashMap<String, ProtocolName>>,
}

impl InMemoryAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `device_id` to `protocol`, returning the previous assignment.
    pub fn assign(&self, device_id: impl Into<String>, protocol: ProtocolName) -> Option<ProtocolName> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device_id.into(), protocol)
    }

    /// Removes the assignment for `device_id`, returning it if present.
    pub fn unassign(&self, device_id: &str) -> Option<ProtocolName> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device_id)
    }

    pub fn get(&self, device_id: &str) -> Option<ProtocolName> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Into<String>> FromIterator<(S, ProtocolName)> for InMemoryAssignments {
    fn from_iter<I: IntoIterator<Item = (S, ProtocolName)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

impl AssignmentStore for InMemoryAssignments {
    async fn assigned_protocol(
        &self,
        device_id: &str,
    ) -> Result<Option<ProtocolName>, AssignmentError> {
        Ok(self.get(device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_returns_previous() {
        let store = InMemoryAssignments::new();
        assert_eq!(store.assign("dev-1", ProtocolName::Gt06), None);
        assert_eq!(
            store.assign("dev-1", ProtocolName::Suntech4g),
            Some(ProtocolName::Gt06)
        );
        assert_eq!(store.get("dev-1"), Some(ProtocolName::Suntech4g));
    }

    #[test]
    fn test_unassign_removes_entry() {
        let store: InMemoryAssignments = [("dev-1", ProtocolName::Gt06)].into_iter().collect();
        assert_eq!(store.unassign("dev-1"), Some(ProtocolName::Gt06));
        assert_eq!(store.unassign("dev-1"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_assigned_protocol_unknown_device_is_none() {
        let store = InMemoryAssignments::new();
        assert_eq!(store.assigned_protocol("nobody").await, Ok(None));
    }
}
