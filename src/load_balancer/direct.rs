//! Direct node: static weight, no feedback.
//!
//! # Responsibilities
//! - Report the configured initial weight (or a default)
//! - Track the last pick time for anti-starvation checks

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::{delegate_node, elapsed_since, monotonic_nanos};
use crate::selector::{CallContext, DoneFunc, DoneInfo, Node, WeightedNode, WeightedNodeBuilder};

/// Weight used when a node has no initial weight.
pub const DEFAULT_WEIGHT: i64 = 100;

/// Weighted node whose weight never changes at runtime.
#[derive(Debug)]
pub struct DirectNode {
    node: Arc<dyn Node>,
    default_weight: i64,
    /// Last pick stamp (`monotonic_nanos`), 0 = never.
    last_pick: AtomicI64,
}

impl DirectNode {
    pub fn new(node: Arc<dyn Node>, default_weight: i64) -> Self {
        Self {
            node,
            default_weight,
            last_pick: AtomicI64::new(0),
        }
    }
}

delegate_node!(DirectNode);

impl WeightedNode for DirectNode {
    fn raw(&self) -> Arc<dyn Node> {
        self.node.clone()
    }

    fn weight(&self) -> f64 {
        self.node.initial_weight().unwrap_or(self.default_weight) as f64
    }

    fn pick(&self) -> DoneFunc {
        self.last_pick.store(monotonic_nanos(), Ordering::Relaxed);
        Box::new(|_: &CallContext, _: DoneInfo| {})
    }

    fn pick_elapsed(&self) -> Duration {
        elapsed_since(self.last_pick.load(Ordering::Relaxed))
    }
}

/// Builds `DirectNode`s.
#[derive(Debug, Clone)]
pub struct DirectBuilder {
    default_weight: i64,
}

impl DirectBuilder {
    pub fn new(default_weight: i64) -> Self {
        Self { default_weight }
    }
}

impl Default for DirectBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT)
    }
}

impl WeightedNodeBuilder for DirectBuilder {
    fn build(&self, node: Arc<dyn Node>) -> Arc<dyn WeightedNode> {
        Arc::new(DirectNode::new(node, self.default_weight))
    }
}
