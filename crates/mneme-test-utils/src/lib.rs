//! Test helpers shared across Mneme crates.

pub mod embedding;
pub mod llm;

pub use embedding::{FailingEmbedder, MapEmbedder};
pub use llm::{FailingCompleter, FixedCompleter, PendingCompleter, ScriptedCompleter};
