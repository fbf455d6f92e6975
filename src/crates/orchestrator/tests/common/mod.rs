//! Scripted provider adapters shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use llm::{AdapterRegistry, AdapterRequest, LlmError, OutputKind, ProviderAdapter, ProviderOutput};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Behavior {
    Reply(String),
    Fail(String),
    Panic,
}

/// Shared journal of `start:<model>` / `end:<model>` entries.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct MockAdapter {
    provider: String,
    model: String,
    behavior: Behavior,
    delay: Duration,
    tokens: u32,
    calls: Arc<AtomicUsize>,
    journal: Option<Journal>,
}

impl MockAdapter {
    pub fn reply(provider: &str, model: &str, text: impl Into<String>) -> Self {
        Self::new(provider, model, Behavior::Reply(text.into()))
    }

    pub fn failing(provider: &str, model: &str, message: &str) -> Self {
        Self::new(provider, model, Behavior::Fail(message.to_string()))
    }

    pub fn panicking(provider: &str, model: &str) -> Self {
        Self::new(provider, model, Behavior::Panic)
    }

    fn new(provider: &str, model: &str, behavior: Behavior) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            behavior,
            delay: Duration::ZERO,
            tokens: 800,
            calls: Arc::new(AtomicUsize::new(0)),
            journal: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn log(&self, event: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("{}:{}", event, self.model));
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn output_kind(&self) -> OutputKind {
        OutputKind::Text
    }

    async fn generate(&self, _request: &AdapterRequest) -> llm::Result<ProviderOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log("start");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log("end");

        match &self.behavior {
            Behavior::Reply(text) => Ok(ProviderOutput::text(text.clone(), self.tokens)),
            Behavior::Fail(message) => Err(LlmError::ProviderError(message.clone())),
            Behavior::Panic => panic!("adapter for {} exploded", self.model),
        }
    }
}

pub fn registry(adapters: Vec<MockAdapter>) -> Arc<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    for adapter in adapters {
        registry.register(Arc::new(adapter));
    }
    Arc::new(registry)
}

/// Roughly forty words about a todo app, varied by `twist`.
pub fn summary(twist: &str) -> String {
    format!(
        "This todo application lets users create edit and delete tasks. Tasks are stored in \
         local storage and rendered in a simple list with checkboxes. Completed items move to \
         the bottom of the list and can be cleared in one click {}.",
        twist
    )
}
