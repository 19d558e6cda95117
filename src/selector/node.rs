//! Default `Node` implementation built from registry records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::selector::Node;

/// Metadata key carrying the initial weight of an instance.
pub const WEIGHT_METADATA_KEY: &str = "weight";

/// A service instance as published in the registry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceInstance {
    /// Registry-assigned instance id.
    pub id: String,
    pub name: String,
    pub version: String,
    pub metadata: HashMap<String, String>,
    /// Endpoints, e.g. `grpc://127.0.0.1:9000`.
    pub endpoints: Vec<String>,
}

/// Plain, immutable node.
#[derive(Debug, Clone, Default)]
pub struct DefaultNode {
    scheme: String,
    addr: String,
    weight: Option<i64>,
    version: String,
    name: String,
    metadata: HashMap<String, String>,
}

impl DefaultNode {
    /// Create a node for `addr`, filling identity and weight from `instance`
    /// when given. A `weight` metadata value that is not an integer is ignored.
    pub fn new(
        scheme: impl Into<String>,
        addr: impl Into<String>,
        instance: Option<&ServiceInstance>,
    ) -> Self {
        let mut node = Self {
            scheme: scheme.into(),
            addr: addr.into(),
            ..Self::default()
        };

        if let Some(ins) = instance {
            node.name = ins.name.clone();
            node.version = ins.version.clone();
            node.metadata = ins.metadata.clone();
            node.weight = ins
                .metadata
                .get(WEIGHT_METADATA_KEY)
                .and_then(|raw| raw.trim().parse::<i64>().ok());
        }
        node
    }
}

impl Node for DefaultNode {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn address(&self) -> &str {
        &self.addr
    }

    fn service_name(&self) -> &str {
        &self.name
    }

    fn initial_weight(&self) -> Option<i64> {
        self.weight
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}
