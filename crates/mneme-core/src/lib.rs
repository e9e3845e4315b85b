//! Memory engine for Mneme.
//!
//! This crate owns the retention strategies for the short-term window, the
//! engine facade coordinating both memory tiers, and context assembly for the
//! reply model.

pub mod context;
pub mod engine;
pub mod error;
pub mod prompts;
pub mod retention;
mod sessions;

/// Context assembly.
pub use context::{ContextAssembler, ContextStats};
/// Engine facade and turn-level results.
pub use engine::{
    ClearReport, MemoryEngine, MemoryEngineBuilder, MemoryStats, PreparedTurn, TurnOutcome,
};
/// Engine error type.
pub use error::MnemeError;
pub use prompts::DEFAULT_SYSTEM_PROMPT;
/// Short-term retention strategies.
pub use retention::{MaintenanceReport, RetentionPolicy};
