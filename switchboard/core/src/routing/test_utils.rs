//! Router Test Utilities
//!
//! A scripted in-process provider for exercising routing, fallback and
//! circuit behavior without network calls.
//!
//! # Usage
//!
//! ```ignore
//! let groq = ScriptedProvider::new(ProviderId::Groq).failing();
//! let ollama = ScriptedProvider::new(ProviderId::Ollama);
//! let providers = provider_set(&[&groq, &ollama]);
//!
//! // After the request, verify which providers were called
//! assert_eq!(groq.call_count(), 1);
//! assert_eq!(ollama.requests()[0].model, "llama3.2");
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::provider::{GenerateRequest, LlmProvider, ProviderError, ProviderId, ProviderSet};

/// What a scripted provider does when asked to generate
#[derive(Clone, Debug)]
pub enum Behavior {
    /// Answer with this text
    Reply(String),
    /// Fail with this error
    Fail(ProviderError),
}

/// Provider whose answers, latency and reachability are set by the test
#[derive(Debug)]
pub struct ScriptedProvider {
    id: ProviderId,
    behavior: Mutex<Behavior>,
    delay: Mutex<Duration>,
    reachable: AtomicBool,
    requests: Mutex<Vec<GenerateRequest>>,
    probes: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedProvider {
    /// Reachable provider that replies `"<id> reply"`
    pub fn new(id: ProviderId) -> Arc<Self> {
        Arc::new(Self {
            id,
            behavior: Mutex::new(Behavior::Reply(format!("{id} reply"))),
            delay: Mutex::new(Duration::ZERO),
            reachable: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    /// Make every call fail with an unreachable error
    pub fn failing(self: Arc<Self>) -> Arc<Self> {
        self.set_behavior(Behavior::Fail(ProviderError::Unreachable {
            provider: self.id,
            message: "connection refused".to_string(),
        }));
        self
    }

    /// Make the reachability probe report `false`
    pub fn unreachable(self: Arc<Self>) -> Arc<Self> {
        self.set_reachable(false);
        self
    }

    /// Delay every generate call
    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock().unwrap() = delay;
        self
    }

    /// Replace the generate behavior
    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Set the probe answer
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of generate calls
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of probes
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of close calls
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.behavior.lock().unwrap().clone() {
            Behavior::Reply(text) => Ok(text),
            Behavior::Fail(err) => Err(err),
        }
    }

    async fn check_reachable(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a provider set from scripted providers
pub fn provider_set(providers: &[&Arc<ScriptedProvider>]) -> ProviderSet {
    let mut set = ProviderSet::new();
    for provider in providers {
        set.insert(Arc::clone(*provider) as Arc<dyn LlmProvider>);
    }
    set
}
