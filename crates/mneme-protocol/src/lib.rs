//! Shared types for Mneme: model instructions and the external collaborators
//! (completion and embedding) the memory engine consumes.

mod collaborator;

pub use collaborator::{CollaboratorError, Completer, Embedder};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Speaker role for a single model instruction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstructionRole {
    /// System-level guidance.
    System,
    /// User-authored content.
    User,
    /// Assistant-authored content.
    Assistant,
}

impl InstructionRole {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionRole::System => "system",
            InstructionRole::User => "user",
            InstructionRole::Assistant => "assistant",
        }
    }
}

impl FromStr for InstructionRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(InstructionRole::System),
            "user" => Ok(InstructionRole::User),
            "assistant" => Ok(InstructionRole::Assistant),
            other => Err(format!("unknown instruction role: {other}")),
        }
    }
}

/// One entry of the ordered instruction sequence sent to a completer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instruction {
    /// Who the content is attributed to.
    pub role: InstructionRole,
    /// Instruction text.
    pub content: String,
}

impl Instruction {
    /// Build a system instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: InstructionRole::System,
            content: content.into(),
        }
    }

    /// Build a user instruction.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: InstructionRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant instruction.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: InstructionRole::Assistant,
            content: content.into(),
        }
    }
}
