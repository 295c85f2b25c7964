//! Turn graph - runs one user message through the decision nodes
//!
//! START → gatekeeper ─┬─► receptionist → END
//!                     └─► classifier ─┬─► technical → END
//!                                     └─► financial → END

use crate::audit::TurnRecord;
use crate::classifier::{classify_domain, Gatekeeper};
use crate::config::{ContractPolicy, RouterConfig};
use crate::error::RouterError;
use crate::llm::{CompletionService, OfflineCompletionService, OpenAiClient};
use crate::models::{DomainLabel, RouteDecision, TurnState};
use crate::responders::Responder;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Gatekeeper,
    Receptionist,
    Classifier,
    Technical,
    Financial,
}

impl Node {
    pub const ENTRY: Node = Node::Gatekeeper;

    pub fn is_terminal(self) -> bool {
        matches!(self, Node::Receptionist | Node::Technical | Node::Financial)
    }

    /// Edge out of `self` given the state it left behind.
    /// Terminal nodes return `None`.
    pub fn next(self, state: &TurnState) -> Result<Option<Node>> {
        match self {
            Node::Gatekeeper => match state.route_decision() {
                Some(RouteDecision::Receptionist) => Ok(Some(Node::Receptionist)),
                Some(RouteDecision::Classifier) => Ok(Some(Node::Classifier)),
                None => Err(RouterError::StateError(
                    "gatekeeper finished without a route decision".to_string(),
                )),
            },
            Node::Classifier => match state.domain_label() {
                Some(DomainLabel::Technical) => Ok(Some(Node::Technical)),
                Some(DomainLabel::Financial) => Ok(Some(Node::Financial)),
                None => Err(RouterError::StateError(
                    "classifier finished without a domain label".to_string(),
                )),
            },
            Node::Receptionist | Node::Technical | Node::Financial => Ok(None),
        }
    }
}

/// Final state of a turn plus its record
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub state: TurnState,
    pub record: TurnRecord,
}

impl TurnOutcome {
    pub fn route_decision(&self) -> Option<RouteDecision> {
        self.state.route_decision()
    }

    pub fn domain_label(&self) -> Option<DomainLabel> {
        self.state.domain_label()
    }

    pub fn reply(&self) -> Option<&str> {
        self.state.reply()
    }
}

/// Runs turns against one completion service. Holds no per-turn state,
/// so a single router can serve any number of independent turns.
pub struct TurnRouter {
    service: Arc<dyn CompletionService>,
    gatekeeper: Gatekeeper,
}

impl TurnRouter {
    pub fn new(service: Arc<dyn CompletionService>, policy: ContractPolicy) -> Self {
        Self {
            service,
            gatekeeper: Gatekeeper::new(policy),
        }
    }

    /// Router backed by the configured OpenAI-compatible endpoint
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let client = OpenAiClient::new(config.require_llm()?)?;
        Ok(Self::new(Arc::new(client), config.contract_policy))
    }

    /// Router backed by the keyword-scoring offline service
    pub fn offline(policy: ContractPolicy) -> Self {
        Self::new(Arc::new(OfflineCompletionService::new()), policy)
    }

    /// Run one turn. Blank input is rejected before any external call;
    /// any node failure ends the turn with that error, without retry.
    pub async fn run_turn(&self, user_message: &str) -> Result<TurnOutcome> {
        let mut state = TurnState::new(user_message)?;

        let turn_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut trace = Vec::new();
        let mut current = Some(Node::ENTRY);

        info!(turn_id = %turn_id, "Turn started");

        while let Some(node) = current {
            debug!(turn_id = %turn_id, node = ?node, "Entering node");
            trace.push(node);

            if let Err(e) = self.execute(node, &mut state).await {
                warn!(turn_id = %turn_id, node = ?node, "Turn failed: {}", e);
                return Err(e);
            }

            current = node.next(&state)?;
        }

        let record = TurnRecord::new(
            turn_id,
            started_at,
            start.elapsed().as_millis() as u64,
            trace,
            &state,
        );

        info!(
            turn_id = %turn_id,
            route = ?state.route_decision(),
            domain = ?state.domain_label(),
            nodes = record.trace.len(),
            elapsed_ms = record.elapsed_ms,
            "Turn complete"
        );

        Ok(TurnOutcome { state, record })
    }

    async fn execute(&self, node: Node, state: &mut TurnState) -> Result<()> {
        let service = self.service.as_ref();
        let user_text = state.latest_user_text()?.to_string();

        match node {
            Node::Gatekeeper => {
                let decision = self.gatekeeper.decide(service, &user_text).await?;
                state.set_route_decision(decision)
            }
            Node::Classifier => {
                let label = classify_domain(service, &user_text).await?;
                state.set_domain_label(label)
            }
            Node::Receptionist => {
                let reply = Responder::Receptionist.respond(service, &user_text).await?;
                state.push_assistant(reply);
                Ok(())
            }
            Node::Technical | Node::Financial => {
                let label = state.domain_label().ok_or_else(|| {
                    RouterError::StateError("specialist reached without a domain label".to_string())
                })?;
                let reply = Responder::for_domain(label).respond(service, &user_text).await?;
                state.push_assistant(reply);
                Ok(())
            }
        }
    }
}
