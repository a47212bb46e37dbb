pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod keyring;
pub mod lists;
pub mod notify;
pub mod refresh;
pub mod session;
pub mod tasks;
pub mod view;

pub use error::ClientError;

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether debug logging is active, shared between the logger filter and the `--debug` flag.
static DEBUG_LOGGING: AtomicBool = AtomicBool::new(false);

pub fn set_debug_logging(enabled: bool) {
    DEBUG_LOGGING.store(enabled, Ordering::Relaxed);
}

pub fn debug_logging() -> bool {
    DEBUG_LOGGING.load(Ordering::Relaxed)
}
