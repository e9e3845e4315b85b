//! Assembly of the instruction sequence sent to the reply model.

use crate::prompts::{
    DEFAULT_SYSTEM_PROMPT, MEMORY_BLOCK_FOOTER, MEMORY_BLOCK_HEADER, SUMMARY_PREFIX,
};
use mneme_memory::{RetrievalResult, Role, Turn};
use mneme_protocol::{Instruction, InstructionRole};
use serde::Serialize;

/// Counts describing an assembled context. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    pub total: usize,
    pub system: usize,
    pub user: usize,
    pub assistant: usize,
    /// Total characters divided by four.
    pub estimated_tokens: usize,
}

/// Builds instructions from the system prompt, ranked memories, and turns.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    default_system_prompt: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ContextAssembler {
    /// Create an assembler; `None` keeps the built-in system prompt.
    pub fn new(default_system_prompt: Option<String>) -> Self {
        default_system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .map(|default_system_prompt| Self {
                default_system_prompt,
            })
            .unwrap_or_default()
    }

    /// System prompt used when a call does not supply one.
    pub fn default_system_prompt(&self) -> &str {
        &self.default_system_prompt
    }

    /// System prompt, memory block (if any), then turns oldest first.
    pub fn assemble(
        &self,
        memories: &[RetrievalResult],
        turns: &[Turn],
        system_prompt: Option<&str>,
    ) -> Vec<Instruction> {
        self.assemble_with_summary(memories, None, turns, system_prompt)
    }

    /// Like [`assemble`](Self::assemble) with the running summary placed
    /// between the memory block and the turns.
    pub fn assemble_with_summary(
        &self,
        memories: &[RetrievalResult],
        summary: Option<&str>,
        turns: &[Turn],
        system_prompt: Option<&str>,
    ) -> Vec<Instruction> {
        let mut instructions = Vec::with_capacity(turns.len() + 3);
        let system_prompt = system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(&self.default_system_prompt);
        instructions.push(Instruction::system(system_prompt));

        if !memories.is_empty() {
            instructions.push(Instruction::system(render_memory_block(memories)));
        }
        if let Some(summary) = summary.filter(|summary| !summary.trim().is_empty()) {
            instructions.push(Instruction::system(format!("{SUMMARY_PREFIX}\n{summary}")));
        }
        instructions.extend(turns.iter().map(|turn| match turn.role {
            Role::User => Instruction::user(turn.content.clone()),
            Role::Assistant => Instruction::assistant(turn.content.clone()),
        }));
        instructions
    }

    /// Count instructions per role and estimate tokens.
    pub fn stats(instructions: &[Instruction]) -> ContextStats {
        let mut stats = ContextStats {
            total: instructions.len(),
            ..ContextStats::default()
        };
        let mut chars = 0;
        for instruction in instructions {
            match instruction.role {
                InstructionRole::System => stats.system += 1,
                InstructionRole::User => stats.user += 1,
                InstructionRole::Assistant => stats.assistant += 1,
            }
            chars += instruction.content.chars().count();
        }
        stats.estimated_tokens = chars / 4;
        stats
    }
}

fn render_memory_block(memories: &[RetrievalResult]) -> String {
    let mut block = format!("{MEMORY_BLOCK_HEADER}\n\n");
    for memory in memories {
        let category = memory.record.category;
        let content = &memory.record.content;
        match memory.emphasis.marker() {
            Some(marker) => block.push_str(&format!("{marker} [{category}]: {content}\n")),
            None => block.push_str(&format!("[{category}]: {content}\n")),
        }
    }
    block.push('\n');
    block.push_str(MEMORY_BLOCK_FOOTER);
    block
}
