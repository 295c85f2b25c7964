//! Turn records
//!
//! Every finished turn is summarised in a record handed back to the caller.
//! Records are not stored anywhere.

use crate::graph::Node;
use crate::models::TurnState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub turn_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub trace: Vec<Node>,
    /// SHA-256 of the final state; equal states give equal hashes
    pub state_hash: String,
}

impl TurnRecord {
    pub fn new(
        turn_id: Uuid,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
        trace: Vec<Node>,
        state: &TurnState,
    ) -> Self {
        Self {
            turn_id,
            started_at,
            elapsed_ms,
            trace,
            state_hash: compute_state_hash(state),
        }
    }
}

/// Compute SHA256 hash of a turn state.
/// Streams the JSON serialization straight into the hasher.
pub fn compute_state_hash(state: &TurnState) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), state).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteDecision;

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let mut a = TurnState::new("Hi there!").unwrap();
        let mut b = TurnState::new("Hi there!").unwrap();
        assert_eq!(compute_state_hash(&a), compute_state_hash(&b));
        assert_eq!(compute_state_hash(&a).len(), 64);

        a.set_route_decision(RouteDecision::Receptionist).unwrap();
        assert_ne!(compute_state_hash(&a), compute_state_hash(&b));

        b.set_route_decision(RouteDecision::Receptionist).unwrap();
        b.push_assistant("Hello!");
        assert_ne!(compute_state_hash(&a), compute_state_hash(&b));
    }

    #[test]
    fn test_record_carries_trace() {
        let state = TurnState::new("hello").unwrap();
        let record = TurnRecord::new(
            Uuid::new_v4(),
            Utc::now(),
            4,
            vec![Node::Gatekeeper, Node::Receptionist],
            &state,
        );
        assert_eq!(record.trace.len(), 2);
        assert_eq!(record.state_hash, compute_state_hash(&state));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["trace"][1], "receptionist");
    }
}
