//! Initial values measured through an off-screen probe element.

use crate::host::{NodeKey, StyleHost};
use css_apply::InitialValueProbe;
use log::{trace, warn};

/// Resolves `initial` by reading computed values off an `all: initial`
/// element that is created on first use and then reused.
pub struct HostProbe<'host, H: StyleHost> {
    host: &'host mut H,
    node: &'host mut Option<NodeKey>,
}

impl<'host, H: StyleHost> HostProbe<'host, H> {
    #[inline]
    pub fn new(host: &'host mut H, node: &'host mut Option<NodeKey>) -> Self {
        Self { host, node }
    }

    fn probe_node(&mut self) -> Option<NodeKey> {
        if self.node.is_none() {
            match self.host.create_measure_probe() {
                Ok(node) => *self.node = Some(node),
                Err(err) => warn!("could not create measuring probe: {err:#}"),
            }
        }
        *self.node
    }
}

impl<H: StyleHost> InitialValueProbe for HostProbe<'_, H> {
    fn initial_value(&mut self, property: &str) -> String {
        let measured = self
            .probe_node()
            .and_then(|node| self.host.computed_property_value(node, property))
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        trace!("initial value of {property}: {measured:?}");
        measured.unwrap_or_else(|| "initial".to_owned())
    }
}
