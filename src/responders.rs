//! Terminal responders
//!
//! Each responder answers the latest user message with its own persona
//! prompt through a free-form completion call. The specialist dispatcher
//! maps a domain label to the matching specialist.

use crate::llm::CompletionService;
use crate::models::{ChatMessage, DomainLabel};
use crate::Result;
use tracing::{error, info};

const RECEPTIONIST_PERSONA: &str = "You are a friendly and helpful AI receptionist for a customer service center. Greet the user, and ask them how you can help with their technical or financial questions. Keep your responses brief and polite.";

const TECHNICAL_PERSONA: &str = "You are a technical support specialist. Your mission is to help customers with technical issues, internet problems, message errors, and login issues in a clear and helpful manner.";

const FINANCIAL_PERSONA: &str = "You are a financial support specialist. Your mission is to help customers with billing, payment, and refund questions in an empathetic and precise manner.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Responder {
    Receptionist,
    Technical,
    Financial,
}

impl Responder {
    /// Specialist dispatch: one responder per domain label
    pub fn for_domain(label: DomainLabel) -> Self {
        match label {
            DomainLabel::Technical => Responder::Technical,
            DomainLabel::Financial => Responder::Financial,
        }
    }

    pub fn persona(self) -> &'static str {
        match self {
            Responder::Receptionist => RECEPTIONIST_PERSONA,
            Responder::Technical => TECHNICAL_PERSONA,
            Responder::Financial => FINANCIAL_PERSONA,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Responder::Receptionist => "receptionist",
            Responder::Technical => "technical",
            Responder::Financial => "financial",
        }
    }

    /// Produce the reply text for `user_text`
    pub async fn respond(self, service: &dyn CompletionService, user_text: &str) -> Result<String> {
        let prompt = [
            ChatMessage::system(self.persona()),
            ChatMessage::user(user_text),
        ];

        match service.generate(&prompt).await {
            Ok(reply) => {
                info!(responder = self.name(), chars = reply.len(), "Reply generated");
                Ok(reply)
            }
            Err(e) => {
                error!(responder = self.name(), "Reply generation failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedCompletionService, ScriptedReply};

    #[test]
    fn test_dispatch_by_domain() {
        assert_eq!(Responder::for_domain(DomainLabel::Technical), Responder::Technical);
        assert_eq!(Responder::for_domain(DomainLabel::Financial), Responder::Financial);
    }

    #[test]
    fn test_personas_are_distinct() {
        let personas = [
            Responder::Receptionist.persona(),
            Responder::Technical.persona(),
            Responder::Financial.persona(),
        ];
        assert_ne!(personas[0], personas[1]);
        assert_ne!(personas[1], personas[2]);
        assert!(personas[2].contains("billing"));
    }

    #[tokio::test]
    async fn test_respond_uses_persona_prompt() {
        let service = ScriptedCompletionService::new([ScriptedReply::Text(
            "Sorry about the double charge.".into(),
        )]);

        let reply = Responder::Financial
            .respond(&service, "Why was I charged twice?")
            .await
            .unwrap();
        assert_eq!(reply, "Sorry about the double charge.");

        let calls = service.calls().await;
        assert_eq!(calls[0].prompt[0], ChatMessage::system(FINANCIAL_PERSONA));
        assert_eq!(calls[0].prompt[1], ChatMessage::user("Why was I charged twice?"));
        assert_eq!(calls[0].schema, None);
    }

    #[tokio::test]
    async fn test_respond_propagates_failure() {
        let service = ScriptedCompletionService::new([ScriptedReply::Failure("503".into())]);
        let result = Responder::Receptionist.respond(&service, "hi").await;
        assert!(result.unwrap_err().is_external_failure());
    }
}
