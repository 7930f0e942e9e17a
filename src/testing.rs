//! Test doubles for the collaborator contracts.

use crate::agents::{
    ContentGenerator, GenerationRequest, ImageGenerator, Publisher, SearchProvider, SearchResult,
};
use crate::domain::failure::CollaboratorError;
use crate::domain::types::ExternalPostId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Reply = Result<String, CollaboratorError>;
type Responder = dyn Fn(&GenerationRequest) -> Reply + Send + Sync;

/// Content generator that replays a script, then a fallback reply.
///
/// Clones share the script and the call log.
#[derive(Clone)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Option<Reply>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Ok(text.to_string()))
    }

    pub fn always_err(err: CollaboratorError) -> Self {
        Self::new(Vec::new()).with_fallback(Err(err))
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(reply) => reply,
            None => self.fallback.clone().unwrap_or_else(|| {
                Err(CollaboratorError::permanent("scripted", "script exhausted"))
            }),
        }
    }
}

/// Content generator that answers from a closure, recording each request.
#[derive(Clone)]
pub struct FnGenerator {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl FnGenerator {
    pub fn new(responder: impl Fn(&GenerationRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls_for(&self, purpose: &str) -> usize {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|r| r.purpose == purpose)
            .count()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ContentGenerator for FnGenerator {
    fn name(&self) -> &str {
        "fn"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        (self.responder)(request)
    }
}

/// Image provider with a fixed outcome and a call counter.
#[derive(Clone)]
pub struct FixedImage {
    name: String,
    outcome: Result<Option<PathBuf>, CollaboratorError>,
    calls: Arc<AtomicUsize>,
}

impl FixedImage {
    pub fn succeeding(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(Some(PathBuf::from(path))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(CollaboratorError::transient(name, "provider down")),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FixedImage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _prompt: &str) -> Result<Option<PathBuf>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// A post captured by [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPost {
    pub text: String,
    pub hashtags: Vec<String>,
    pub image_path: Option<PathBuf>,
}

/// Publisher stub that records posts instead of sending them.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    posts: Arc<Mutex<Vec<RecordedPost>>>,
    failure: Option<CollaboratorError>,
    latency: Option<Duration>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    /// Each post takes `latency` before it is recorded.
    pub fn slow(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().expect("posts lock").clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn post(
        &self,
        text: &str,
        hashtags: &[String],
        image_path: Option<&Path>,
    ) -> Result<ExternalPostId, CollaboratorError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut posts = self.posts.lock().expect("posts lock");
        posts.push(RecordedPost {
            text: text.to_string(),
            hashtags: hashtags.to_vec(),
            image_path: image_path.map(Path::to_path_buf),
        });
        Ok(ExternalPostId(format!("post-{}", posts.len())))
    }
}

/// Search provider returning the same results for every query.
#[derive(Clone)]
pub struct StaticSearch {
    results: Option<Vec<SearchResult>>,
    calls: Arc<AtomicUsize>,
}

impl StaticSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results: Some(results),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            results: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .clone()
            .ok_or_else(|| CollaboratorError::permanent("search", "no api key"))
    }
}
