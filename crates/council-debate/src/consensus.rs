//! Consensus synthesis over a finished set of agent outputs
//!
//! Pure functions: the same ordered outputs always give the same consensus,
//! disagreement and summary.

use crate::model::{
    AgentOutput, Confidence, ConsensusPoint, DebateSession, DebateStatus, DisagreementPoint,
    EvidenceStrength, MarketContext, Stance, Viewpoint,
};
use chrono::Utc;
use uuid::Uuid;

/// Agents cited by the secondary consensus point
const CATALYST_CITATIONS: usize = 3;

/// HIGH-confidence agents needed for a strong consensus: ceil(N * 4/5)
pub fn high_confidence_threshold(agents: usize) -> usize {
    agents.saturating_mul(4).div_ceil(5)
}

/// Points of agreement; never empty for a non-empty roster
pub fn build_consensus(outputs: &[AgentOutput], subject: &str) -> Vec<ConsensusPoint> {
    let high: Vec<String> = outputs
        .iter()
        .filter(|output| output.confidence() == Confidence::High)
        .map(|output| output.agent_name().to_string())
        .collect();

    if !high.is_empty() && high.len() >= high_confidence_threshold(outputs.len()) {
        return vec![
            ConsensusPoint {
                statement: format!("{} of {} agents show HIGH confidence", high.len(), outputs.len()),
                supporting_agents: high,
                strength: EvidenceStrength::Strong,
            },
            ConsensusPoint {
                statement: format!("Multiple agents identify real catalysts driving {subject}"),
                supporting_agents: agent_names(outputs.iter().take(CATALYST_CITATIONS)),
                strength: EvidenceStrength::Moderate,
            },
        ];
    }

    vec![ConsensusPoint {
        statement: "Multi-agent analysis identifies mixed factors".to_string(),
        supporting_agents: agent_names(outputs.iter()),
        strength: EvidenceStrength::Moderate,
    }]
}

/// Points of contention; always exactly one topic
pub fn build_disagreements(outputs: &[AgentOutput]) -> Vec<DisagreementPoint> {
    let skeptic = outputs
        .iter()
        .find(|output| output.agent().stance == Stance::Skeptic);

    if let Some(skeptic) = skeptic {
        let majority = names_where(outputs, |stance| stance != Stance::Skeptic);

        return vec![DisagreementPoint {
            topic: "Is this move sustainable?".to_string(),
            viewpoints: vec![
                Viewpoint {
                    label: format!("Majority ({} agents)", majority.len()),
                    position: "Real catalysts support the move".to_string(),
                    strength: Some(EvidenceStrength::Strong),
                    agents: majority,
                },
                Viewpoint {
                    label: skeptic.agent_name().to_string(),
                    position: "Move needs confirmation, risks present".to_string(),
                    strength: Some(EvidenceStrength::Moderate),
                    agents: vec![skeptic.agent_name().to_string()],
                },
            ],
        }];
    }

    vec![DisagreementPoint {
        topic: "Short-term vs long-term implications".to_string(),
        viewpoints: vec![
            Viewpoint {
                label: "Fundamental-leaning agents".to_string(),
                position: "Fundamental value shift".to_string(),
                strength: None,
                agents: names_where(outputs, Stance::is_fundamental_leaning),
            },
            Viewpoint {
                label: "Technical/Flow-leaning agents".to_string(),
                position: "Technical setup driving".to_string(),
                strength: None,
                agents: names_where(outputs, Stance::is_technical_leaning),
            },
        ],
    }]
}

fn names_where(outputs: &[AgentOutput], keep: impl Fn(Stance) -> bool) -> Vec<String> {
    outputs
        .iter()
        .filter(|output| keep(output.agent().stance))
        .map(|output| output.agent_name().to_string())
        .collect()
}

/// Display narrative for a debate
pub fn build_summary(
    outputs: &[AgentOutput],
    market: &MarketContext,
    consensus: &[ConsensusPoint],
) -> String {
    let mut summary = format!(
        "\n🎙️ MULTI-AGENT DEBATE: {} {} {:.2}%\n{}\n\nAGENT PERSPECTIVES:\n",
        market.subject,
        market.direction,
        market.abs_move(),
        "=".repeat(60)
    );

    for (i, output) in outputs.iter().enumerate() {
        summary.push_str(&format!(
            "{}. {} ({}): {}\n",
            i + 1,
            output.agent_name(),
            output.confidence(),
            output.thesis()
        ));
    }

    summary.push_str("\nCONSENSUS:\n");
    for point in consensus {
        summary.push_str(&format!("✓ {}\n", point.statement));
    }

    let high = outputs
        .iter()
        .filter(|output| output.confidence() == Confidence::High)
        .count();
    summary.push_str(&format!(
        "\n{high}/{} agents show high confidence.\n",
        outputs.len()
    ));
    summary
}

/// Assemble the final session from outputs in configured order
pub fn synthesize(market: MarketContext, outputs: Vec<AgentOutput>) -> DebateSession {
    let consensus_points = build_consensus(&outputs, &market.subject);
    let disagreement_points = build_disagreements(&outputs);
    let summary = build_summary(&outputs, &market, &consensus_points);

    DebateSession {
        id: Uuid::new_v4(),
        subject: market.subject.clone(),
        timestamp: Utc::now(),
        status: DebateStatus::Complete,
        market_context: market,
        agent_outputs: outputs,
        consensus_points,
        disagreement_points,
        summary,
    }
}

fn agent_names<'a>(outputs: impl Iterator<Item = &'a AgentOutput>) -> Vec<String> {
    outputs.map(|output| output.agent_name().to_string()).collect()
}
