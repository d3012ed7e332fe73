//! Collaborator capabilities consumed by the assessor.
//!
//! - `ContextAssembler`: gathers external facts for one release
//! - `PromptRenderer`: turns input and context into prompt text
//! - `ModelClient`: sends a prompt and returns the raw completion
//!
//! All traits are async and backend-agnostic. Deterministic fakes live in
//! the `fakes` module.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Context, ContextError, ModelError, ParseError, ReleaseInput, RenderError};

/// Prompt text handed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

impl RenderedPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Copy of this prompt with a repair instruction naming the last parse failure.
    pub fn with_repair(&self, error: &ParseError) -> Self {
        Self {
            system: self.system.clone(),
            user: format!(
                "{}\n\n## Correction\nYour previous response was rejected: {}.\n\
                 Respond again with a single JSON object that matches the required schema exactly. \
                 Use \"GO\" or \"NO_GO\" for decision and a number between 0.0 and 1.0 for risk_score.",
                self.user, error
            ),
        }
    }
}

/// Gathers external facts about a release.
#[async_trait]
pub trait ContextAssembler: Send + Sync {
    async fn build_context(&self, input: &ReleaseInput) -> Result<Context, ContextError>;
}

/// Renders prompt text. Synchronous: rendering is pure string work.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, input: &ReleaseInput, context: &Context) -> Result<RenderedPrompt, RenderError>;
}

/// Sends a prompt to the judgment model.
///
/// Every failure is reported as a [`ModelError`] and treated as transient.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ModelError>;
}

#[async_trait]
impl<T: ContextAssembler + ?Sized> ContextAssembler for Arc<T> {
    async fn build_context(&self, input: &ReleaseInput) -> Result<Context, ContextError> {
        (**self).build_context(input).await
    }
}

impl<T: PromptRenderer + ?Sized> PromptRenderer for Arc<T> {
    fn render(&self, input: &ReleaseInput, context: &Context) -> Result<RenderedPrompt, RenderError> {
        (**self).render(input, context)
    }
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ModelError> {
        (**self).complete(prompt).await
    }
}
