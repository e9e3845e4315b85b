use async_trait::async_trait;
use mneme_protocol::{CollaboratorError, Embedder};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Deterministic embedder backed by an exact-text lookup table.
///
/// Unknown texts embed to the fallback vector, which is a unit vector on the
/// last axis unless overridden.
#[derive(Debug, Clone)]
pub struct MapEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MapEmbedder {
    pub fn new(dimension: usize) -> Self {
        let mut fallback = vec![0.0; dimension];
        if let Some(last) = fallback.last_mut() {
            *last = 1.0;
        }
        Self {
            dimension,
            vectors: HashMap::new(),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Map an exact text to a vector.
    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Vector returned for unmapped texts.
    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = vector;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Texts embedded so far, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Embedder for MapEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        self.calls.lock().push(text.to_string());
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

/// Fails every embedding request.
#[derive(Debug, Clone, Default)]
pub struct FailingEmbedder {
    calls: Arc<Mutex<usize>>,
}

impl FailingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CollaboratorError> {
        *self.calls.lock() += 1;
        Err(CollaboratorError::Embedding("embedder unavailable".to_string()))
    }
}
