//! Support Desk Router
//!
//! Routes a single customer message through a small decision graph:
//! - a gatekeeper separates conversational fluff from real queries
//! - real queries are classified as technical or financial
//! - a specialist responder (or the receptionist) writes the reply
//!
//! Every judgment is delegated to an external completion service; this
//! crate owns the wiring, the closed-set validation and the error policy.
//!
//! TURN:
//! START → GATEKEEPER → (RECEPTIONIST | CLASSIFIER → TECHNICAL | FINANCIAL) → END

pub mod api;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod models;
pub mod responders;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use config::{ContractPolicy, RouterConfig};
pub use graph::{Node, TurnOutcome, TurnRouter};
pub use llm::CompletionService;
