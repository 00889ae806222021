//! Wiring: configuration in, a ready router out.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use trackbridge_protocol::builder_for;
use trackbridge_session::{Destination, SessionRegistry};
use trackbridge_transport::TcpConnector;

use crate::assignment::{AssignmentStore, InMemoryAssignments};
use crate::config::BridgeConfig;
use crate::router::OutputRouter;

/// A running bridge: one TCP destination per configured protocol, the
/// session registry over them, and the router producers call.
///
/// Sessions connect lazily, so building a bridge never touches the
/// network.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), trackbridge::BridgeError> {
/// use trackbridge::prelude::*;
///
/// let config = BridgeConfig::from_file("bridge.toml")?;
/// let bridge = Bridge::with_config_assignments(config);
/// let router = bridge.router();
/// // hand `router` to every producer, then on exit:
/// bridge.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Bridge<S: AssignmentStore> {
    registry: Arc<SessionRegistry<TcpConnector>>,
    router: Arc<OutputRouter<S>>,
}

impl<S: AssignmentStore> Bridge<S> {
    /// Builds the bridge from an already-validated config.
    pub fn from_config(config: &BridgeConfig, store: S) -> Self {
        let settings = &config.session;

        let destinations: HashMap<_, _> = config
            .destinations
            .iter()
            .map(|(&protocol, dest)| {
                let connector = TcpConnector::new(&dest.host, dest.port)
                    .connect_timeout(settings.connect_timeout())
                    .write_timeout(settings.write_timeout());
                info!(%protocol, host = %dest.host, port = dest.port, "destination configured");
                let destination = Destination {
                    connector,
                    builder: builder_for(protocol, &dest.builder),
                    account: dest.account.clone(),
                };
                (protocol, destination)
            })
            .collect();

        let registry = Arc::new(SessionRegistry::new(
            destinations,
            settings.session_config(),
        ));
        let router = Arc::new(OutputRouter::new(
            Arc::clone(&registry),
            store,
            config.default_protocol,
        ));

        Self { registry, router }
    }

    /// The router to hand to producers.
    pub fn router(&self) -> Arc<OutputRouter<S>> {
        Arc::clone(&self.router)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<TcpConnector>> {
        &self.registry
    }

    /// Stops every heartbeat and closes every destination connection.
    ///
    /// Forwards made afterwards fail with a closed-session error.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

impl Bridge<InMemoryAssignments> {
    /// Builds the bridge with an in-memory store seeded from
    /// `config.assignments`.
    pub fn with_config_assignments(config: BridgeConfig) -> Self {
        let store: InMemoryAssignments = config
            .assignments
            .iter()
            .map(|(device, &protocol)| (device.clone(), protocol))
            .collect();
        Self::from_config(&config, store)
    }
}
