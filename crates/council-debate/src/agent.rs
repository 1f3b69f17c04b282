//! Agent task: one identity, one provider, bounded retries, deterministic fallback

use crate::error::DebateError;
use crate::model::{AgentIdentity, AgentOutput, Confidence, MarketContext, Stance};
use crate::prompts::PromptBuilder;
use crate::provider::GenerationProvider;
use crate::retry::RetryPolicy;
use crate::sanitizer::{extract_structured, normalize_output};
use serde_json::Map;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Points attached to every fallback output
pub const FALLBACK_POINTS: [&str; 3] = [
    "Market dynamics suggest continuation possible",
    "Volume patterns support current movement",
    "Technical levels being tested",
];

/// A debate participant bound to its provider
pub struct AgentTask {
    identity: AgentIdentity,
    provider: Arc<dyn GenerationProvider>,
    prompts: Arc<PromptBuilder>,
    policy: RetryPolicy,
}

impl AgentTask {
    pub fn new(
        identity: AgentIdentity,
        provider: Arc<dyn GenerationProvider>,
        prompts: Arc<PromptBuilder>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            identity,
            provider,
            prompts,
            policy,
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn provider(&self) -> &dyn GenerationProvider {
        self.provider.as_ref()
    }

    /// Produce this agent's output; never fails
    ///
    /// Up to `max_attempts` provider calls, each sanitized and normalized.
    /// When every attempt fails the deterministic fallback is returned.
    #[instrument(skip(self, market), fields(agent = %self.identity.name, subject = %market.subject))]
    pub async fn run(&self, market: &MarketContext) -> AgentOutput {
        let prompts = self
            .prompts
            .system_prompt(&self.identity)
            .and_then(|system| Ok((system, self.prompts.user_prompt(market)?)));
        let (system, prompt) = match prompts {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Could not render prompts for {}: {}", self.identity.name, e);
                return fallback_output(&self.identity, market);
            }
        };

        let (system, prompt) = (system.as_str(), prompt.as_str());
        let outcome = self
            .policy
            .execute(&self.identity.name, move |_| self.attempt(prompt, system))
            .await;

        match outcome.result {
            Ok(output) => {
                info!(
                    "✓ {} completed ({} confidence, {} attempt(s))",
                    self.identity.name,
                    output.confidence(),
                    outcome.attempts
                );
                output.with_attempts(outcome.attempts)
            }
            Err(e) => {
                warn!(
                    "All {} attempts failed for {}, using fallback: {}",
                    outcome.attempts, self.identity.name, e
                );
                fallback_output(&self.identity, market).with_attempts(outcome.attempts)
            }
        }
    }

    async fn attempt(&self, prompt: &str, system: &str) -> Result<AgentOutput, DebateError> {
        let raw = self
            .provider
            .invoke(
                prompt,
                system,
                self.identity.temperature,
                self.policy.attempt_timeout,
            )
            .await?;
        debug!(chars = raw.len(), "Received response from {}", self.provider.describe());

        let value = extract_structured(&raw).inspect_err(|e| {
            debug!(cleaned = %e.cleaned, "Unparseable response: {}", e.reason);
        })?;
        Ok(normalize_output(&self.identity, value)?)
    }
}

/// Deterministic output used when an agent cannot produce one
pub fn fallback_output(identity: &AgentIdentity, market: &MarketContext) -> AgentOutput {
    AgentOutput::new(
        identity.clone(),
        fallback_thesis(identity.stance, market),
        FALLBACK_POINTS.map(String::from).to_vec(),
        Confidence::Moderate,
        Map::new(),
    )
    .into_fallback()
}

fn fallback_thesis(stance: Stance, market: &MarketContext) -> String {
    let subject = &market.subject;
    let direction = market.direction;
    let pct = format!("{:.2}", market.abs_move());

    match stance {
        Stance::Macro => format!(
            "{subject} moved {direction} {pct}% likely due to broader market sentiment and sector rotation."
        ),
        Stance::Fundamental => format!(
            "{subject}'s {pct}% move suggests fundamental catalyst or earnings expectations shift."
        ),
        Stance::Flow => format!(
            "Institutional flow patterns showing {pct}% move in {subject} with above-average volume."
        ),
        Stance::Technical => {
            format!("{subject} showing {pct}% technical movement with momentum indicators active.")
        }
        Stance::Skeptic => format!(
            "{subject}'s {pct}% move requires confirmation - monitoring for sustainability."
        ),
        Stance::Other => format!("{subject} moved {pct}% {direction}"),
    }
}
