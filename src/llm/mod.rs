//! Completion service trait and implementations
//!
//! Every decision and every reply in a turn is delegated to a completion
//! service. Two call shapes are supported: free-form generation and a choice
//! from a closed set of options.

use crate::error::RouterError;
use crate::models::ChatMessage;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub mod offline;
pub mod openai;

pub use offline::OfflineCompletionService;
pub use openai::OpenAiClient;

/// Closed output contract for a structured call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub field: &'static str,
    pub field_description: &'static str,
    pub options: &'static [&'static str],
}

/// External text-completion provider
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Free text for a role-tagged prompt
    async fn generate(&self, prompt: &[ChatMessage]) -> Result<String>;

    /// Raw value of `schema.field`. Callers validate it against
    /// `schema.options`; implementations must not coerce it.
    async fn choose(&self, prompt: &[ChatMessage], schema: &ChoiceSchema) -> Result<String>;
}

/// One canned answer for [`ScriptedCompletionService`]
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Choice(String),
    Failure(String),
}

/// Call recorded by [`ScriptedCompletionService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: Vec<ChatMessage>,
    pub schema: Option<&'static str>,
}

/// Replays a fixed queue of answers in order and records every call.
/// Useful for tests and local development without a provider.
pub struct ScriptedCompletionService {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedCompletionService {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    async fn next_reply(&self, prompt: &[ChatMessage], schema: Option<&'static str>) -> Result<ScriptedReply> {
        self.calls.lock().await.push(RecordedCall {
            prompt: prompt.to_vec(),
            schema,
        });

        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| RouterError::LlmError("scripted replies exhausted".to_string()))
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    async fn generate(&self, prompt: &[ChatMessage]) -> Result<String> {
        match self.next_reply(prompt, None).await? {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Failure(message) => Err(RouterError::LlmError(message)),
            ScriptedReply::Choice(value) => Err(RouterError::LlmError(format!(
                "expected free text, script holds choice {:?}",
                value
            ))),
        }
    }

    async fn choose(&self, prompt: &[ChatMessage], schema: &ChoiceSchema) -> Result<String> {
        match self.next_reply(prompt, Some(schema.name)).await? {
            ScriptedReply::Choice(value) => Ok(value),
            ScriptedReply::Failure(message) => Err(RouterError::LlmError(message)),
            ScriptedReply::Text(text) => Err(RouterError::LlmError(format!(
                "expected choice, script holds text {:?}",
                text
            ))),
        }
    }
}
