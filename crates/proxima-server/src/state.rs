//! Application state shared across handlers.
//!
//! The whole service context lives behind one lock. Every [`Hub`] method is
//! synchronous, so a handler holds the guard only for the duration of one
//! call and never across an `.await`.

use std::sync::Arc;

use proxima_core::{Clock, Config, Hub};
use tokio::sync::RwLock;

/// Shared application state.
pub type SharedState = Arc<RwLock<Hub>>;

/// Build the shared state from configuration and a time source.
pub fn new_state(config: Config, clock: Arc<dyn Clock>) -> SharedState {
    Arc::new(RwLock::new(Hub::new(config, clock)))
}
