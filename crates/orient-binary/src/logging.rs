//! Codec tracing hooks.
//!
//! The codec logs through `trace!`, `debug!` and `warn!` from this module.
//! With the `logging` feature they are `tracing` events and the embedding
//! application installs the subscriber. Without it they expand to nothing.
//!
//! ```rust,ignore
//! use crate::logging::{debug, warn};
//!
//! debug!(class = %name, fields = count, "decoded document");
//! warn!(control = byte, "unknown link bag control bits");
//! ```

/// Per-value detail such as pointers and tags.
#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { tracing::trace!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

/// One event per document or link bag.
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Input the codec tolerates but a server would not normally send.
#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

pub(crate) use log_debug as debug;
pub(crate) use log_trace as trace;
pub(crate) use log_warn as warn;
