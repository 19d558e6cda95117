//! Composable selector: a node builder plus a balancer over an
//! atomically swapped candidate snapshot.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::observability::metrics;
use crate::selector::{
    Balancer, BalancerBuilder, Builder, CallContext, DoneFunc, Node, Rebalancer, Selector,
    SelectorError, SelectorResult, WeightedNode, WeightedNodeBuilder,
};

/// Default selector.
///
/// Readers load the current snapshot without locking; `apply` publishes a
/// fully built replacement, so a `select` sees either the old or the new
/// node set, never a mix.
pub struct DefaultSelector {
    node_builder: Arc<dyn WeightedNodeBuilder>,
    balancer: Box<dyn Balancer>,
    nodes: ArcSwap<Vec<Arc<dyn WeightedNode>>>,
}

impl DefaultSelector {
    pub fn new(node_builder: Arc<dyn WeightedNodeBuilder>, balancer: Box<dyn Balancer>) -> Self {
        Self {
            node_builder,
            balancer,
            nodes: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Number of nodes in the current snapshot.
    pub fn len(&self) -> usize {
        self.nodes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Selector for DefaultSelector {
    fn select(&self, ctx: &CallContext) -> SelectorResult<(Arc<dyn Node>, DoneFunc)> {
        let candidates = self.nodes.load();
        if candidates.is_empty() {
            tracing::warn!(balancer = self.balancer.name(), "No available node to select");
            metrics::record_no_available(self.balancer.name());
            return Err(SelectorError::NoAvailableNode);
        }

        let (selected, done) = self.balancer.pick(ctx, &candidates)?;
        let raw = selected.raw();
        if let Some(peer) = ctx.peer() {
            peer.set_node(raw.clone());
        }

        tracing::trace!(
            balancer = self.balancer.name(),
            address = raw.address(),
            candidates = candidates.len(),
            "Node selected"
        );
        metrics::record_pick(self.balancer.name(), raw.address());
        Ok((raw, done))
    }
}

impl Rebalancer for DefaultSelector {
    fn apply(&self, nodes: Vec<Arc<dyn Node>>) {
        // Wrappers are rebuilt from scratch, so running statistics reset
        // even for addresses present in both sets.
        let weighted: Vec<Arc<dyn WeightedNode>> = nodes
            .into_iter()
            .map(|n| self.node_builder.build(n))
            .collect();

        tracing::debug!(
            balancer = self.balancer.name(),
            nodes = weighted.len(),
            "Applying node set"
        );
        metrics::record_candidates(self.balancer.name(), weighted.len());
        self.nodes.store(Arc::new(weighted));
    }
}

/// Wires a node builder and a balancer builder into `DefaultSelector`s.
#[derive(Clone)]
pub struct DefaultBuilder {
    pub node: Arc<dyn WeightedNodeBuilder>,
    pub balancer: Arc<dyn BalancerBuilder>,
}

impl DefaultBuilder {
    pub fn new(node: Arc<dyn WeightedNodeBuilder>, balancer: Arc<dyn BalancerBuilder>) -> Self {
        Self { node, balancer }
    }
}

impl Builder for DefaultBuilder {
    fn build(&self) -> Box<dyn Selector> {
        Box::new(DefaultSelector::new(self.node.clone(), self.balancer.build()))
    }
}
