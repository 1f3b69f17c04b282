//! Debate data model: agent identities, outputs, market context and sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Analytical stance of an agent
///
/// The synthesizer uses stances to find the critical voice and to split
/// fundamental-leaning from technical/flow-leaning agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Macro,
    Fundamental,
    Flow,
    Technical,
    Skeptic,
    #[default]
    Other,
}

impl Stance {
    /// Agents weighing value and economic drivers
    pub fn is_fundamental_leaning(self) -> bool {
        matches!(self, Self::Macro | Self::Fundamental)
    }

    /// Agents reading price action and order flow
    pub fn is_technical_leaning(self) -> bool {
        matches!(self, Self::Flow | Self::Technical)
    }
}

/// Immutable description of one debate participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    /// Display name, unique within a roster
    pub name: String,
    /// Role description given to the model
    pub role: String,
    /// Sampling temperature for this agent's calls
    pub temperature: f32,
    #[serde(default)]
    pub stance: Stance,
    /// Replaces the stance's default system prompt when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AgentIdentity {
    pub fn new(name: impl Into<String>, role: impl Into<String>, temperature: f32) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            temperature,
            stance: Stance::Other,
            system_prompt: None,
        }
    }

    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = stance;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Agent's self-reported confidence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    #[default]
    Moderate,
    High,
}

impl Confidence {
    /// Case-insensitive parse; anything unrecognized is `Moderate`
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Moderate,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
        })
    }
}

/// Strength of the evidence behind a consensus or a viewpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvidenceStrength {
    Weak,
    Moderate,
    Strong,
}

/// One agent's structured opinion
///
/// Built only by [`crate::sanitizer::normalize_output`] from provider data, or
/// by the agent task's deterministic fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredAgentOutput")]
pub struct AgentOutput {
    agent: AgentIdentity,
    thesis: String,
    supporting_points: Vec<String>,
    confidence: Confidence,
    #[serde(skip_serializing_if = "Map::is_empty")]
    extras: Map<String, Value>,
    fallback: bool,
    attempts: u32,
}

/// Wire form of [`AgentOutput`]; decoding goes back through the constructor
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAgentOutput {
    agent: AgentIdentity,
    thesis: String,
    supporting_points: Vec<String>,
    confidence: Confidence,
    #[serde(default)]
    extras: Map<String, Value>,
    #[serde(default)]
    fallback: bool,
    #[serde(default)]
    attempts: u32,
}

impl From<StoredAgentOutput> for AgentOutput {
    fn from(stored: StoredAgentOutput) -> Self {
        let output = Self::new(
            stored.agent,
            stored.thesis,
            stored.supporting_points,
            stored.confidence,
            stored.extras,
        )
        .with_attempts(stored.attempts);
        if stored.fallback { output.into_fallback() } else { output }
    }
}

impl AgentOutput {
    /// Maximum number of supporting points kept per output
    pub const MAX_POINTS: usize = 4;

    pub(crate) fn new(
        agent: AgentIdentity,
        thesis: String,
        mut supporting_points: Vec<String>,
        confidence: Confidence,
        extras: Map<String, Value>,
    ) -> Self {
        supporting_points.truncate(Self::MAX_POINTS);
        Self {
            agent,
            thesis,
            supporting_points,
            confidence,
            extras,
            fallback: false,
            attempts: 0,
        }
    }

    pub(crate) fn into_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn agent(&self) -> &AgentIdentity {
        &self.agent
    }

    pub fn agent_name(&self) -> &str {
        &self.agent.name
    }

    pub fn thesis(&self) -> &str {
        &self.thesis
    }

    pub fn supporting_points(&self) -> &[String] {
        &self.supporting_points
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Whether this output is the deterministic fallback
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Provider calls spent producing this output
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// A statement most agents agree on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusPoint {
    pub statement: String,
    pub supporting_agents: Vec<String>,
    pub strength: EvidenceStrength,
}

/// One side of a disagreement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewpoint {
    pub label: String,
    pub position: String,
    /// `None` means unrated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<EvidenceStrength>,
    /// Agents holding this view
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
}

/// A topic with at least two competing viewpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisagreementPoint {
    pub topic: String,
    pub viewpoints: Vec<Viewpoint>,
}

/// Direction of the day's move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    /// Only used when no market data was ever requested
    Unknown,
}

impl Direction {
    /// `Up` for a strictly positive move, `Down` otherwise
    pub fn from_move(percent_move: f64) -> Self {
        if percent_move > 0.0 { Self::Up } else { Self::Down }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// Price/volume/move figures returned by a market-data fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub price: f64,
    /// Percent change versus the previous close (1.2 means +1.2 %)
    pub percent_move: f64,
    pub direction: Direction,
    pub volume: u64,
}

impl MarketSnapshot {
    pub fn new(price: f64, percent_move: f64, volume: u64) -> Self {
        Self {
            price,
            percent_move,
            direction: Direction::from_move(percent_move),
            volume,
        }
    }

    /// Placeholder used when the fetcher fails
    pub fn synthetic() -> Self {
        Self::new(150.0, 1.2, 50_000_000)
    }
}

/// Market context shared by every agent in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    pub subject: String,
    pub price: f64,
    pub percent_move: f64,
    pub direction: Direction,
    pub volume: u64,
    /// True when the figures are a placeholder rather than fetched data
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic_context: Option<String>,
}

impl MarketContext {
    pub fn from_snapshot(
        subject: impl Into<String>,
        snapshot: MarketSnapshot,
        economic_context: Option<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            price: snapshot.price,
            percent_move: snapshot.percent_move,
            direction: snapshot.direction,
            volume: snapshot.volume,
            synthetic: false,
            economic_context,
        }
    }

    pub fn synthetic(subject: impl Into<String>, economic_context: Option<String>) -> Self {
        Self {
            synthetic: true,
            ..Self::from_snapshot(subject, MarketSnapshot::synthetic(), economic_context)
        }
    }

    /// Zeroed context for sessions that never reached the market
    pub fn unknown(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            price: 0.0,
            percent_move: 0.0,
            direction: Direction::Unknown,
            volume: 0,
            synthetic: true,
            economic_context: None,
        }
    }

    /// Magnitude of the move
    pub fn abs_move(&self) -> f64 {
        self.percent_move.abs()
    }
}

/// Outcome of a debate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebateStatus {
    Complete,
    Unavailable,
}

/// A finished debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateSession {
    pub id: Uuid,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub status: DebateStatus,
    pub market_context: MarketContext,
    /// In configured roster order
    pub agent_outputs: Vec<AgentOutput>,
    pub consensus_points: Vec<ConsensusPoint>,
    pub disagreement_points: Vec<DisagreementPoint>,
    pub summary: String,
}

impl DebateSession {
    /// Result returned when no debate could be run at all
    pub fn unavailable(subject: impl Into<String>, reason: impl fmt::Display) -> Self {
        let subject = subject.into();
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status: DebateStatus::Unavailable,
            market_context: MarketContext::unknown(subject.clone()),
            subject,
            agent_outputs: Vec::new(),
            consensus_points: Vec::new(),
            disagreement_points: Vec::new(),
            summary: format!("⚠️ LLM Council Unavailable: {reason}"),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == DebateStatus::Complete
    }

    /// Number of agents reporting HIGH confidence
    pub fn high_confidence_count(&self) -> usize {
        self.agent_outputs
            .iter()
            .filter(|output| output.confidence() == Confidence::High)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_parse_lenient() {
        assert_eq!(Confidence::parse_lenient("HIGH"), Confidence::High);
        assert_eq!(Confidence::parse_lenient(" low "), Confidence::Low);
        assert_eq!(Confidence::parse_lenient("Moderate"), Confidence::Moderate);
        assert_eq!(Confidence::parse_lenient("very high"), Confidence::Moderate);
        assert_eq!(Confidence::parse_lenient(""), Confidence::Moderate);
    }

    #[test]
    fn test_direction_from_move() {
        assert_eq!(Direction::from_move(0.01), Direction::Up);
        assert_eq!(Direction::from_move(0.0), Direction::Down);
        assert_eq!(Direction::from_move(-2.5), Direction::Down);
        assert_eq!(Direction::Up.to_string(), "UP");
    }

    #[test]
    fn test_output_truncates_points() {
        let points = (1..=6).map(|i| format!("point {i}")).collect();
        let output = AgentOutput::new(
            AgentIdentity::new("A", "analyst", 0.5),
            "thesis".to_string(),
            points,
            Confidence::High,
            Map::new(),
        );
        assert_eq!(output.supporting_points().len(), AgentOutput::MAX_POINTS);
        assert_eq!(output.supporting_points()[3], "point 4");
        assert!(!output.is_fallback());
    }

    #[test]
    fn test_decoded_output_is_truncated() {
        let value = serde_json::json!({
            "agent": {"name": "A", "role": "analyst", "temperature": 0.5},
            "thesis": "thesis",
            "supportingPoints": ["p1", "p2", "p3", "p4", "p5", "p6"],
            "confidence": "HIGH",
            "fallback": true,
            "attempts": 2
        });

        let output: AgentOutput = serde_json::from_value(value).unwrap();
        assert_eq!(output.supporting_points(), ["p1", "p2", "p3", "p4"]);
        assert_eq!(output.confidence(), Confidence::High);
        assert!(output.is_fallback());
        assert_eq!(output.attempts(), 2);

        let round: AgentOutput = serde_json::from_value(serde_json::to_value(&output).unwrap()).unwrap();
        assert_eq!(round, output);
    }

    #[test]
    fn test_synthetic_context() {
        let context = MarketContext::synthetic("NVDA", None);
        assert!(context.synthetic);
        assert_eq!(context.price, 150.0);
        assert_eq!(context.percent_move, 1.2);
        assert_eq!(context.volume, 50_000_000);
        assert_eq!(context.direction, Direction::Up);
    }

    #[test]
    fn test_unavailable_session() {
        let session = DebateSession::unavailable("TSLA", "no providers");
        assert_eq!(session.status, DebateStatus::Unavailable);
        assert!(session.agent_outputs.is_empty());
        assert!(session.consensus_points.is_empty());
        assert_eq!(session.market_context.direction, Direction::Unknown);
        assert_eq!(session.summary, "⚠️ LLM Council Unavailable: no providers");
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = DebateSession::unavailable("AAPL", "offline");
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["marketContext"]["direction"], "UNKNOWN");
        assert!(json["agentOutputs"].as_array().unwrap().is_empty());

        let back: DebateSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
