//! Per-call context and peer record.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::selector::Node;

/// The remote end of one RPC.
///
/// Attached to the call context before selection; the selector fills in
/// the chosen node so interceptors and loggers can see where the call went.
#[derive(Debug, Default)]
pub struct Peer {
    node: RwLock<Option<Arc<dyn Node>>>,
}

impl Peer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node chosen for this call, if selection has happened.
    pub fn node(&self) -> Option<Arc<dyn Node>> {
        self.node.read().clone()
    }

    pub fn set_node(&self, node: Arc<dyn Node>) {
        *self.node.write() = Some(node);
    }
}

/// Request-scoped values passed through selection and completion.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    peer: Option<Arc<Peer>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a context carrying `peer`.
    pub fn with_peer(mut self, peer: Arc<Peer>) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn peer(&self) -> Option<&Arc<Peer>> {
        self.peer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::DefaultNode;

    #[test]
    fn test_peer_roundtrip_through_context() {
        let peer = Arc::new(Peer::new());
        let ctx = CallContext::new().with_peer(peer.clone());
        assert!(ctx.peer().and_then(|p| p.node()).is_none());

        peer.set_node(Arc::new(DefaultNode::new("grpc", "10.0.0.7:9000", None)));

        let node = ctx.peer().and_then(|p| p.node()).unwrap();
        assert_eq!(node.address(), "10.0.0.7:9000");
    }

    #[test]
    fn test_context_without_peer() {
        assert!(CallContext::new().peer().is_none());
    }
}
