//! Public SDK surface for Mneme.
//!
//! This crate re-exports the memory building blocks and provides a small
//! initialization helper to keep consumer setup consistent.

/// Re-export for convenience.
pub use mneme_config as config;
pub use mneme_core as core;
/// Re-export for convenience.
pub use mneme_memory as memory;
/// Re-export for convenience.
pub use mneme_protocol as protocol;

pub use mneme_config::{LayeredConfig, MnemeConfig};
pub use mneme_core::{MemoryEngine, MemoryEngineBuilder, MnemeError, TurnOutcome};
pub use mneme_protocol::{Completer, Embedder, Instruction};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// No-op without the feature. Applications call this once at startup.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
