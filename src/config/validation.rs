//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (time constants > 0, weights >= 0)
//! - Detect duplicate node addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SelectorConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::SelectorConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("node #{index} has an empty address")]
    EmptyAddress { index: usize },

    #[error("duplicate node address: {0}")]
    DuplicateAddress(String),

    #[error("node {address} has negative weight {weight}")]
    NegativeWeight { address: String, weight: i64 },
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &SelectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.ewma.tau_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "ewma.tau_ms" });
    }
    if config.ewma.penalty_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "ewma.penalty_ms" });
    }
    if config.p2c.force_pick_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "p2c.force_pick_ms" });
    }
    if config.direct.default_weight <= 0 {
        errors.push(ValidationError::NotPositive { field: "direct.default_weight" });
    }

    let mut seen = HashSet::new();
    for (index, node) in config.nodes.iter().enumerate() {
        if node.address.trim().is_empty() {
            errors.push(ValidationError::EmptyAddress { index });
            continue;
        }
        if !seen.insert(node.address.as_str()) {
            errors.push(ValidationError::DuplicateAddress(node.address.clone()));
        }
        if let Some(weight) = node.weight.filter(|w| *w < 0) {
            errors.push(ValidationError::NegativeWeight {
                address: node.address.clone(),
                weight,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::NodeConfig;
    use std::collections::HashMap;

    fn node(address: &str, weight: Option<i64>) -> NodeConfig {
        NodeConfig {
            scheme: "grpc".into(),
            address: address.into(),
            service_name: String::new(),
            version: String::new(),
            weight,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&SelectorConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SelectorConfig::default();
        config.ewma.tau_ms = 0;
        config.p2c.force_pick_ms = 0;
        config.nodes = vec![
            node("10.0.0.1:9000", Some(1)),
            node("10.0.0.1:9000", None),
            node(" ", None),
            node("10.0.0.3:9000", Some(-4)),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NotPositive { field: "ewma.tau_ms" },
                ValidationError::NotPositive { field: "p2c.force_pick_ms" },
                ValidationError::DuplicateAddress("10.0.0.1:9000".into()),
                ValidationError::EmptyAddress { index: 2 },
                ValidationError::NegativeWeight {
                    address: "10.0.0.3:9000".into(),
                    weight: -4
                },
            ]
        );
    }
}
