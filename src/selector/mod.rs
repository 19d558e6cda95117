//! Node selection contracts.
//!
//! # Data Flow
//! ```text
//! discovery (external)
//!     → Rebalancer::apply(nodes)
//!     → WeightedNodeBuilder wraps each Node
//!     → candidate snapshot swapped atomically
//!
//! per call:
//!     Selector::select(ctx)
//!     → Balancer::pick(candidates)
//!     → WeightedNode::pick() → DoneFunc
//!     → caller runs the RPC, then DoneFunc(ctx, DoneInfo)
//! ```
//!
//! # Design Decisions
//! - Node is static identity; WeightedNode carries runtime weight
//! - Balancers are per-call stateless apart from their own RNG/rotation state
//! - DoneFunc is `FnOnce`, so a completion can never be reported twice
//! - The only selection failure is `NoAvailableNode`

pub mod default_selector;
pub mod error;
pub mod global;
pub mod node;
pub mod peer;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use default_selector::{DefaultBuilder, DefaultSelector};
pub use error::{CallError, SelectorError, SelectorResult};
pub use global::{global_selector, set_global_selector};
pub use node::{DefaultNode, ServiceInstance};
pub use peer::{CallContext, Peer};

/// Static identity and metadata of a service instance.
pub trait Node: fmt::Debug + Send + Sync {
    /// Protocol of the endpoint (e.g. "grpc", "http").
    fn scheme(&self) -> &str;

    /// Address, unique within one service.
    fn address(&self) -> &str;

    fn service_name(&self) -> &str;

    /// Initial scheduling weight, `None` when unset.
    fn initial_weight(&self) -> Option<i64>;

    fn version(&self) -> &str;

    /// Key-value metadata attached to the instance (zone, protocol, ...).
    fn metadata(&self) -> &HashMap<String, String>;
}

/// A node with a runtime-computed scheduling weight.
pub trait WeightedNode: Node {
    /// The wrapped node as produced by discovery.
    fn raw(&self) -> Arc<dyn Node>;

    /// Current weight; higher is more desirable. Called for every candidate
    /// on the hot path.
    fn weight(&self) -> f64;

    /// Mark the node as selected now and return its completion callback.
    fn pick(&self) -> DoneFunc;

    /// Time since the last `pick`.
    fn pick_elapsed(&self) -> Duration;
}

/// Wraps a plain node into a weighted one.
pub trait WeightedNodeBuilder: Send + Sync {
    fn build(&self, node: Arc<dyn Node>) -> Arc<dyn WeightedNode>;
}

/// Load balancing algorithm over a candidate slice.
pub trait Balancer: Send + Sync {
    /// Algorithm name, used for logs and metric labels.
    fn name(&self) -> &'static str;

    /// Select one node and return it together with its completion callback.
    fn pick(
        &self,
        ctx: &CallContext,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> SelectorResult<(Arc<dyn WeightedNode>, DoneFunc)>;
}

/// Creates balancer instances.
pub trait BalancerBuilder: Send + Sync {
    fn build(&self) -> Box<dyn Balancer>;
}

/// Receives the full node set whenever membership changes.
pub trait Rebalancer {
    fn apply(&self, nodes: Vec<Arc<dyn Node>>);
}

/// Node selector used by the RPC client for every outgoing call.
pub trait Selector: Rebalancer + Send + Sync {
    /// Select a node. On success the returned `DoneFunc` must be invoked
    /// once the call has finished.
    fn select(&self, ctx: &CallContext) -> SelectorResult<(Arc<dyn Node>, DoneFunc)>;
}

/// Creates selectors.
pub trait Builder: Send + Sync {
    fn build(&self) -> Box<dyn Selector>;
}

/// Reply metadata returned with a finished call (headers, trailers).
pub trait ReplyMd: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl ReplyMd for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Outcome of one call; the only feedback input into adaptive weighting.
#[derive(Default)]
pub struct DoneInfo {
    /// Response error, `None` on success.
    pub err: Option<CallError>,
    pub reply_md: Option<Arc<dyn ReplyMd>>,
    /// Whether any bytes were sent to the server.
    pub bytes_sent: bool,
    /// Whether any bytes were received from the server.
    pub bytes_received: bool,
}

impl DoneInfo {
    /// Outcome of a call that failed with `err`.
    pub fn failed(err: CallError) -> Self {
        Self {
            err: Some(err),
            ..Self::default()
        }
    }
}

impl fmt::Debug for DoneInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoneInfo")
            .field("err", &self.err)
            .field("reply_md", &self.reply_md.is_some())
            .field("bytes_sent", &self.bytes_sent)
            .field("bytes_received", &self.bytes_received)
            .finish()
    }
}

/// Completion callback handed out by `WeightedNode::pick`.
pub type DoneFunc = Box<dyn FnOnce(&CallContext, DoneInfo) + Send + 'static>;
