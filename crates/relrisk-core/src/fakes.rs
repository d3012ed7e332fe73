//! Deterministic collaborator fakes for tests and dry runs.
//!
//! None of these touch the network or the filesystem.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{ContextAssembler, ModelClient, PromptRenderer, RenderedPrompt};
use crate::domain::{Context, ContextError, ModelError, ReleaseInput, RenderError};

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this text.
    Text(String),
    /// Fail with this error.
    Fail(ModelError),
    /// Sleep, then return this text. Useful against the model timeout.
    Delayed(Duration, String),
}

/// Model client that replays a fixed script of replies and records prompts.
///
/// Once the script is exhausted every call fails with
/// [`ModelError::EmptyResponse`].
#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<RenderedPrompt>>,
    calls: AtomicU32,
}

impl ScriptedModelClient {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Client that always answers with the same text.
    pub fn always(text: impl Into<String>, times: usize) -> Self {
        let text = text.into();
        Self::new((0..times).map(|_| ScriptedReply::Text(text.clone())))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<RenderedPrompt> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(err)) => Err(err),
            Some(ScriptedReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(ModelError::EmptyResponse),
        }
    }
}

/// Context assembler returning a fixed context.
#[derive(Debug)]
pub struct StaticContextAssembler {
    context: Context,
    calls: AtomicU32,
}

impl StaticContextAssembler {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticContextAssembler {
    fn default() -> Self {
        Self::new(Context::empty())
    }
}

#[async_trait]
impl ContextAssembler for StaticContextAssembler {
    async fn build_context(&self, _input: &ReleaseInput) -> Result<Context, ContextError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.context.clone())
    }
}

/// Context assembler that always fails, optionally after a delay.
#[derive(Debug)]
pub struct FailingContextAssembler {
    error: ContextError,
    delay: Option<Duration>,
}

impl FailingContextAssembler {
    pub fn new(error: ContextError) -> Self {
        Self { error, delay: None }
    }

    /// Sleeps for `delay` before failing.
    pub fn hanging(delay: Duration) -> Self {
        Self {
            error: ContextError::Unavailable("hung".into()),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl ContextAssembler for FailingContextAssembler {
    async fn build_context(&self, _input: &ReleaseInput) -> Result<Context, ContextError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Err(self.error.clone())
    }
}

/// Renderer producing a compact prompt and counting calls.
#[derive(Debug, Default)]
pub struct CountingRenderer {
    calls: AtomicU32,
    fail_with: Option<String>,
}

impl CountingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_with: Some(reason.into()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PromptRenderer for CountingRenderer {
    fn render(&self, input: &ReleaseInput, context: &Context) -> Result<RenderedPrompt, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_with {
            return Err(RenderError(reason.clone()));
        }
        Ok(RenderedPrompt::new(
            "assess release risk",
            format!(
                "{}#{} ci_failed={} incidents={}",
                input.repo,
                input.pr_number,
                context.ci_failed(),
                context.incidents.len()
            ),
        ))
    }
}
