//! Decision nodes
//!
//! - Gatekeeper: conversational fluff (receptionist) vs. a real query (classifier)
//! - Domain classifier: technical vs. financial
//!
//! Both delegate the judgment to the completion service and validate the
//! answer against the closed set before it touches the turn state.

use crate::config::ContractPolicy;
use crate::llm::{ChoiceSchema, CompletionService};
use crate::models::{ChatMessage, DomainLabel, RouteDecision};
use crate::Result;
use tracing::{info, warn};

const GATEKEEPER_PROMPT: &str = r#"You are an expert at routing user messages.
If the message is a simple greeting, a thank you, or conversational fluff, route to the 'receptionist'.
If the message contains a specific question or problem about technical or financial issues, route to the 'classifier'."#;

const CLASSIFIER_PROMPT: &str = r#"Classify the user message as either:
- 'technical': if it asks for technical support, internet issues, message errors, login problems, or any technical assistance
- 'financial': if it asks for financial information, prices, billing, or payment issues"#;

pub const ROUTE_SCHEMA: ChoiceSchema = ChoiceSchema {
    name: "InitialRouter",
    description: "Determine whether to continue conversation or classify a user query.",
    field: RouteDecision::FIELD,
    field_description: "Choose 'classifier' if the user presents a clear technical or financial question. Otherwise, choose 'receptionist'.",
    options: RouteDecision::LABELS,
};

pub const DOMAIN_SCHEMA: ChoiceSchema = ChoiceSchema {
    name: "MessageClassifier",
    description: "Classify the user's query into technical or financial.",
    field: DomainLabel::FIELD,
    field_description: "Classify the message as 'technical' or 'financial'.",
    options: DomainLabel::LABELS,
};

fn decision_prompt(system: &str, user_text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user_text)]
}

/// Gatekeeper node
pub struct Gatekeeper {
    policy: ContractPolicy,
}

impl Gatekeeper {
    pub fn new(policy: ContractPolicy) -> Self {
        Self { policy }
    }

    /// Service failures always propagate. Out-of-set answers follow the
    /// contract policy.
    pub async fn decide(
        &self,
        service: &dyn CompletionService,
        user_text: &str,
    ) -> Result<RouteDecision> {
        let raw = service
            .choose(&decision_prompt(GATEKEEPER_PROMPT, user_text), &ROUTE_SCHEMA)
            .await?;

        match RouteDecision::parse(&raw) {
            Ok(decision) => {
                info!(decision = %decision, "Gatekeeper decided");
                Ok(decision)
            }
            Err(err) => match self.policy {
                ContractPolicy::Reject => {
                    warn!(raw = %raw, "Gatekeeper answer out of contract, rejecting turn");
                    Err(err)
                }
                ContractPolicy::FallbackToReceptionist => {
                    warn!(raw = %raw, "Gatekeeper answer out of contract, falling back to receptionist");
                    Ok(RouteDecision::Receptionist)
                }
            },
        }
    }
}

/// Domain classifier node. No safe default domain exists, so any
/// out-of-set answer fails the turn.
pub async fn classify_domain(
    service: &dyn CompletionService,
    user_text: &str,
) -> Result<DomainLabel> {
    let raw = service
        .choose(&decision_prompt(CLASSIFIER_PROMPT, user_text), &DOMAIN_SCHEMA)
        .await?;

    let label = DomainLabel::parse(&raw).map_err(|err| {
        warn!(raw = %raw, "Classifier answer out of contract");
        err
    })?;

    info!(domain = %label, "Classifier labelled message");
    Ok(label)
}
