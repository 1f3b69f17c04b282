//! Progress events emitted by a streaming debate

use crate::model::{AgentOutput, DebateSession, MarketContext};
use serde::{Deserialize, Serialize};

/// One step of a streamed debate
///
/// Serialized with a `type` tag so consumers can switch on it directly:
/// `{"type": "agent_result", "agent": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebateEvent {
    Status {
        message: String,
    },
    MarketData {
        data: MarketContext,
    },
    AgentResult {
        agent: String,
        data: AgentOutput,
    },
    DebateComplete {
        data: Box<DebateSession>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
}

impl DebateEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn market_data(data: MarketContext) -> Self {
        Self::MarketData { data }
    }

    pub fn agent_result(data: AgentOutput) -> Self {
        Self::AgentResult {
            agent: data.agent_name().to_string(),
            data,
        }
    }

    pub fn complete(session: DebateSession) -> Self {
        Self::DebateComplete {
            data: Box::new(session),
        }
    }

    pub fn error(message: impl Into<String>, agent: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            agent,
        }
    }

    /// Whether this is the final event of a successful stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DebateComplete { .. })
    }

    /// The finished session, if this is the completion event
    pub fn into_session(self) -> Option<DebateSession> {
        match self {
            Self::DebateComplete { data } => Some(*data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fallback_output;
    use crate::model::AgentIdentity;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_value(DebateEvent::status("Fetching market data for AAPL...")).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "Fetching market data for AAPL...");
    }

    #[test]
    fn test_agent_result_carries_name() {
        let market = MarketContext::synthetic("AAPL", None);
        let output = fallback_output(&AgentIdentity::new("🤔 Skeptic", "Risk", 0.8), &market);
        let event = DebateEvent::agent_result(output);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "agent_result");
        assert_eq!(json["agent"], "🤔 Skeptic");
        assert_eq!(json["data"]["confidence"], "MODERATE");
    }

    #[test]
    fn test_error_without_agent_omits_field() {
        let json = serde_json::to_value(DebateEvent::error("boom", None)).unwrap();
        assert_eq!(json["type"], "error");
        assert!(json.get("agent").is_none());
    }

    #[test]
    fn test_complete_round_trip() {
        let session = DebateSession::unavailable("AAPL", "offline");
        let event = DebateEvent::complete(session.clone());
        assert!(event.is_terminal());

        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains(r#""type":"debate_complete""#));
        let back: DebateEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.into_session(), Some(session));
    }
}
