//! Client-side node selection for RPC clients.
//!
//! Given the current set of instances of a service, pick one per call,
//! learning from each call's outcome.
//!
//! ```text
//! discovery ──apply(nodes)──▶ Selector ──select(ctx)──▶ (Node, DoneFunc)
//!                               │                            │
//!                               ▼                            ▼
//!                       Balancer (p2c/wrr/random)     RPC call, then
//!                       over WeightedNodes            done(ctx, DoneInfo)
//!                       (ewma/direct)  ◀──── feedback ───────┘
//! ```

pub mod config;
pub mod load_balancer;
pub mod observability;
pub mod selector;

pub use config::SelectorConfig;
pub use load_balancer::builder_from_config;
pub use selector::{
    Balancer, BalancerBuilder, Builder, CallContext, CallError, DoneFunc, DoneInfo, Node, Peer,
    Rebalancer, Selector, SelectorError, WeightedNode, WeightedNodeBuilder,
};
