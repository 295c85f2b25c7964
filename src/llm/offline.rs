//! Offline completion service
//!
//! Deterministic keyword scoring in place of a real provider. Keeps the
//! router usable without credentials (`--offline`) and gives tests a
//! stable stand-in.

use super::{ChoiceSchema, CompletionService};
use crate::error::RouterError;
use crate::models::{ChatMessage, MessageRole};
use crate::Result;
use async_trait::async_trait;

/// Matched as whole words
const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "howdy", "thanks", "thank", "thx", "cheers", "bye",
    "goodbye", "morning", "evening", "afternoon", "ok", "okay", "great", "cool",
    "appreciate", "appreciated",
];

/// Keywords shorter than this match whole words (plus a plural `s`) only,
/// so "app" does not fire on "appreciate" or "plan" on "planet".
const MIN_STEM_LEN: usize = 5;

const TECHNICAL_STEMS: &[&str] = &[
    "internet", "wifi", "wi-fi", "connect", "disconnect", "network", "router", "modem",
    "login", "log", "password", "error", "crash", "bug", "app", "install", "update",
    "slow", "outage", "signal", "email", "reset", "broken", "technical",
];

const FINANCIAL_STEMS: &[&str] = &[
    "charg", "bill", "billed", "billing", "invoice", "payment", "pay", "paid", "refund",
    "price", "pricing", "cost", "fee", "subscription", "plan", "discount", "credit",
    "debit", "card", "money", "balance", "financial", "receipt",
];

fn matches_keyword(word: &str, keyword: &str) -> bool {
    if keyword.len() >= MIN_STEM_LEN {
        word.starts_with(keyword)
    } else {
        word == keyword || word.strip_suffix('s') == Some(keyword)
    }
}

/// Keyword-scoring completion service
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCompletionService;

impl OfflineCompletionService {
    pub fn new() -> Self {
        Self
    }

    fn score(option: &str, words: &[String]) -> usize {
        let stems = |list: &[&str]| {
            words
                .iter()
                .filter(|w| list.iter().any(|kw| matches_keyword(w, kw)))
                .count()
        };

        match option {
            "receptionist" => words
                .iter()
                .filter(|w| GREETING_WORDS.contains(&w.as_str()))
                .count(),
            "classifier" => stems(TECHNICAL_STEMS) + stems(FINANCIAL_STEMS),
            "technical" => stems(TECHNICAL_STEMS),
            "financial" => stems(FINANCIAL_STEMS),
            _ => 0,
        }
    }
}

fn last_user_text(prompt: &[ChatMessage]) -> Result<&str> {
    prompt
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .ok_or_else(|| RouterError::LlmError("prompt has no user message".to_string()))
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl CompletionService for OfflineCompletionService {
    async fn generate(&self, prompt: &[ChatMessage]) -> Result<String> {
        let user = last_user_text(prompt)?;
        let persona = prompt
            .iter()
            .find(|m| m.role == MessageRole::System)
            .and_then(|m| m.content.split('.').next())
            .map(str::trim)
            .unwrap_or("Support desk");

        Ok(format!("(offline) {}. You wrote: \"{}\"", persona, user.trim()))
    }

    /// Highest-scoring option wins; ties go to the earlier option.
    async fn choose(&self, prompt: &[ChatMessage], schema: &ChoiceSchema) -> Result<String> {
        let words = tokenize(last_user_text(prompt)?);

        let mut best: Option<(&str, usize)> = None;
        for &option in schema.options {
            let score = Self::score(option, &words);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((option, score));
            }
        }

        best.map(|(option, _)| option.to_string())
            .ok_or_else(|| RouterError::LlmError(format!("schema {} has no options", schema.name)))
    }
}
