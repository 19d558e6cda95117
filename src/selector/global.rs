//! Process-wide default selector builder.
//!
//! Configured once at startup; every client built afterwards reads it.
//! Passing a `Builder` explicitly to client construction is preferred
//! where the caller has one at hand.

use std::sync::{Arc, OnceLock};

use crate::selector::{Builder, SelectorError, SelectorResult};

static GLOBAL_SELECTOR: OnceLock<Arc<dyn Builder>> = OnceLock::new();

/// The configured global builder, if any.
pub fn global_selector() -> Option<Arc<dyn Builder>> {
    GLOBAL_SELECTOR.get().cloned()
}

/// Install the global builder. Only the first call succeeds.
pub fn set_global_selector(builder: Arc<dyn Builder>) -> SelectorResult<()> {
    GLOBAL_SELECTOR
        .set(builder)
        .map_err(|_| SelectorError::GlobalAlreadySet)?;
    tracing::info!("Global selector configured");
    Ok(())
}
