//! Shared fixtures for selector integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use rpc_selector::selector::{DefaultNode, ServiceInstance};
use rpc_selector::{Builder, Node};
use rpc_selector::load_balancer::{p2c, random, wrr};

/// A grpc node at `addr` with an optional `weight` metadata entry.
pub fn node(addr: &str, weight: Option<i64>) -> Arc<dyn Node> {
    let instance = ServiceInstance {
        id: addr.to_string(),
        name: "test-service".into(),
        version: "v1".into(),
        metadata: weight
            .map(|w| HashMap::from([("weight".to_string(), w.to_string())]))
            .unwrap_or_default(),
        endpoints: vec![format!("grpc://{addr}")],
    };
    Arc::new(DefaultNode::new("grpc", addr, Some(&instance)))
}

/// Nodes `n0..n{count}` with no initial weight.
#[allow(dead_code)]
pub fn nodes(count: usize) -> Vec<Arc<dyn Node>> {
    (0..count).map(|i| node(&format!("n{i}"), None)).collect()
}

/// Every stock builder, labelled by algorithm name.
pub fn all_builders() -> Vec<(&'static str, Arc<dyn Builder>)> {
    vec![
        (p2c::NAME, Arc::new(p2c::new_builder()) as Arc<dyn Builder>),
        (wrr::NAME, Arc::new(wrr::new_builder())),
        (random::NAME, Arc::new(random::new_builder())),
    ]
}
