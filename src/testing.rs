//! Test doubles for the model, tool and embedding seams
//!
//! Available outside `cfg(test)` so downstream crates can drive teams
//! without network access.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::embedding::Embedder;
use crate::error::{BrigadeError, Result};
use crate::ingest::DocumentFetcher;
use crate::knowledge::cosine_similarity;
use crate::model::{CompletionClient, CompletionRequest, CompletionResponse};
use crate::tools::Tool;

/// Completion client that replays a fixed sequence of responses.
///
/// Panics if asked for more completions than it was scripted with; a test
/// that over-consumes is a broken test.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, for asserting on prompts.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().push(request);
        let content = self
            .responses
            .lock()
            .pop_front()
            .expect("ScriptedClient ran out of responses");
        Ok(CompletionResponse {
            content,
            model: "scripted".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Completion client that always fails.
pub struct FailingClient {
    reason: String,
}

impl FailingClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for FailingClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Err(BrigadeError::Model(self.reason.clone()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Tool that records every invocation and returns a canned value.
pub struct RecordingTool {
    name: String,
    description: String,
    response: Value,
    invocations: Mutex<Vec<Value>>,
}

impl RecordingTool {
    pub fn new(name: impl Into<String>, response: Value) -> Self {
        let name = name.into();
        Self {
            description: format!("Recording stand-in for '{name}'"),
            name,
            response,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<Value> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        self.invocations.lock().push(input);
        Ok(self.response.clone())
    }
}

/// Fetcher that serves a fixed document for any URL.
pub struct StaticFetcher {
    text: String,
}

impl StaticFetcher {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Deterministic embedder that needs no network.
///
/// Texts sharing words get similar vectors, so similarity ranking behaves
/// plausibly in tests.
pub struct StaticEmbedder {
    dimension: usize,
}

impl StaticEmbedder {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "dimension must be positive");
        Self { dimension }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();
            vector[(hash as usize) % self.dimension] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_client_replays_in_order() {
        let client = ScriptedClient::new(["first", "second"]);
        let a = client.complete(CompletionRequest::default()).await.unwrap();
        let b = client.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn failing_client_fails() {
        let client = FailingClient::new("backend down");
        let err = client.complete(CompletionRequest::default()).await.unwrap_err();
        assert!(matches!(err, BrigadeError::Model(_)));
    }

    #[test]
    fn static_embedder_is_deterministic_and_word_sensitive() {
        let embedder = StaticEmbedder::new(16);
        let a = embedder.embed_sync("green curry paste");
        let b = embedder.embed_sync("green curry paste");
        let c = embedder.embed_sync("stock market report");
        assert_eq!(a, b);

        let same = cosine_similarity(&a, &b);
        let different = cosine_similarity(&a, &c);
        assert!(same > different);
    }
}
