//! Core data models for the support desk router

use crate::error::RouterError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Role-tagged text entry, used both in the turn state and in prompts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

//
// ================= Closed-set decisions =================
//

/// Gatekeeper output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    Receptionist,
    Classifier,
}

impl RouteDecision {
    pub const FIELD: &'static str = "next_node";
    pub const LABELS: &'static [&'static str] = &["receptionist", "classifier"];

    pub fn label(self) -> &'static str {
        match self {
            RouteDecision::Receptionist => "receptionist",
            RouteDecision::Classifier => "classifier",
        }
    }

    /// Parse a raw service answer. Whitespace and ASCII case are ignored,
    /// anything else outside the set is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "receptionist" => Ok(RouteDecision::Receptionist),
            "classifier" => Ok(RouteDecision::Classifier),
            _ => Err(RouterError::OutOfContract {
                field: Self::FIELD,
                value: raw.to_string(),
                expected: Self::LABELS,
            }),
        }
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifier output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DomainLabel {
    Technical,
    Financial,
}

impl DomainLabel {
    pub const FIELD: &'static str = "message_type";
    pub const LABELS: &'static [&'static str] = &["technical", "financial"];

    pub fn label(self) -> &'static str {
        match self {
            DomainLabel::Technical => "technical",
            DomainLabel::Financial => "financial",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(DomainLabel::Technical),
            "financial" => Ok(DomainLabel::Financial),
            _ => Err(RouterError::OutOfContract {
                field: Self::FIELD,
                value: raw.to_string(),
                expected: Self::LABELS,
            }),
        }
    }
}

impl fmt::Display for DomainLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ================= Turn State =================
//

/// State threaded through one turn. Created at turn start, dropped at turn end.
/// Serialize-only: every instance goes through `new` and the guarded setters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TurnState {
    messages: Vec<ChatMessage>,
    route_decision: Option<RouteDecision>,
    domain_label: Option<DomainLabel>,
}

impl TurnState {
    /// Start a turn from one user message. Blank input is rejected here,
    /// before any node can reach the completion service.
    pub fn new(user_message: &str) -> Result<Self> {
        if user_message.trim().is_empty() {
            return Err(RouterError::EmptyMessage);
        }

        Ok(Self {
            messages: vec![ChatMessage::user(user_message)],
            route_decision: None,
            domain_label: None,
        })
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn route_decision(&self) -> Option<RouteDecision> {
        self.route_decision
    }

    pub fn domain_label(&self) -> Option<DomainLabel> {
        self.domain_label
    }

    /// Text of the most recent user entry
    pub fn latest_user_text(&self) -> Result<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .ok_or(RouterError::EmptyMessage)
    }

    /// Most recent assistant reply, if the turn produced one
    pub fn reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn assistant_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .count()
    }

    pub fn set_route_decision(&mut self, decision: RouteDecision) -> Result<()> {
        if let Some(existing) = self.route_decision {
            return Err(RouterError::StateError(format!(
                "route decision already set to {}",
                existing
            )));
        }
        self.route_decision = Some(decision);
        Ok(())
    }

    /// Only legal after the gatekeeper chose the classifier path.
    pub fn set_domain_label(&mut self, label: DomainLabel) -> Result<()> {
        if self.route_decision != Some(RouteDecision::Classifier) {
            return Err(RouterError::StateError(format!(
                "domain label {} requires route decision classifier, found {:?}",
                label, self.route_decision
            )));
        }
        if let Some(existing) = self.domain_label {
            return Err(RouterError::StateError(format!(
                "domain label already set to {}",
                existing
            )));
        }
        self.domain_label = Some(label);
        Ok(())
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }
}
