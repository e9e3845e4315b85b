use async_trait::async_trait;
use mneme_protocol::{CollaboratorError, Completer, Instruction};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

type Requests = Arc<Mutex<Vec<Vec<Instruction>>>>;

fn last_content(instructions: &[Instruction]) -> &str {
    instructions
        .last()
        .map(|instruction| instruction.content.as_str())
        .unwrap_or_default()
}

/// Returns the same reply to every request.
#[derive(Debug, Clone)]
pub struct FixedCompleter {
    response: String,
    requests: Requests,
}

impl FixedCompleter {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<Vec<Instruction>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Completer for FixedCompleter {
    async fn complete(&self, instructions: &[Instruction]) -> Result<String, CollaboratorError> {
        self.requests.lock().push(instructions.to_vec());
        Ok(self.response.clone())
    }
}

/// Replies from routing rules first, then from a queue of scripted results.
///
/// A rule matches when the last instruction contains its needle. Once the
/// queue is empty, unmatched requests fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCompleter {
    rules: Arc<Mutex<Vec<(String, Result<String, CollaboratorError>)>>>,
    script: Arc<Mutex<VecDeque<Result<String, CollaboratorError>>>>,
    requests: Requests,
}

impl ScriptedCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .push_back(Err(CollaboratorError::Completion(message.into())));
        self
    }

    /// Answer every request whose last instruction contains `needle`.
    pub fn when(self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.lock().push((needle.into(), Ok(text.into())));
        self
    }

    /// Fail every request whose last instruction contains `needle`.
    pub fn fail_when(self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.lock().push((
            needle.into(),
            Err(CollaboratorError::Completion(message.into())),
        ));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests whose last instruction contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| last_content(request).contains(needle))
            .count()
    }

    pub fn requests(&self) -> Vec<Vec<Instruction>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, instructions: &[Instruction]) -> Result<String, CollaboratorError> {
        self.requests.lock().push(instructions.to_vec());
        let content = last_content(instructions);
        if let Some((_, result)) = self
            .rules
            .lock()
            .iter()
            .find(|(needle, _)| content.contains(needle.as_str()))
        {
            return result.clone();
        }
        self.script.lock().pop_front().unwrap_or_else(|| {
            Err(CollaboratorError::Completion(
                "script exhausted".to_string(),
            ))
        })
    }
}

/// Fails every request.
#[derive(Debug, Clone)]
pub struct FailingCompleter {
    message: String,
    requests: Requests,
}

impl FailingCompleter {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Completer for FailingCompleter {
    async fn complete(&self, instructions: &[Instruction]) -> Result<String, CollaboratorError> {
        self.requests.lock().push(instructions.to_vec());
        Err(CollaboratorError::Completion(self.message.clone()))
    }
}

/// Never resolves; used to exercise caller timeouts and cancellation.
#[derive(Debug, Clone, Default)]
pub struct PendingCompleter {
    requests: Requests,
}

impl PendingCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Completer for PendingCompleter {
    async fn complete(&self, instructions: &[Instruction]) -> Result<String, CollaboratorError> {
        self.requests.lock().push(instructions.to_vec());
        std::future::pending().await
    }
}
