//! Debate orchestrator
//!
//! Fans one [`AgentTask`] per roster entry out onto a [`JoinSet`], gathers
//! the outputs into configured-order slots and hands them to the consensus
//! synthesizer. Batch and streaming share the same collection path, so both
//! produce the same session for the same providers.

use crate::agent::{AgentTask, fallback_output};
use crate::config::{AgentSpec, DebateConfig, ProviderChoice, ProviderKind, ProviderSettings};
use crate::consensus::synthesize;
use crate::error::{DebateError, Result};
use crate::events::DebateEvent;
use crate::market::MarketDataFetcher;
use crate::model::{AgentIdentity, AgentOutput, DebateSession, MarketContext};
use crate::prompts::PromptBuilder;
use crate::provider::{LlmAdapter, connect};
use crate::retry::RetryPolicy;
use council_llm::LLMProvider;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of one debate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebatePhase {
    Dispatched,
    Running,
    Collecting,
    Synthesizing,
    Complete,
    Aborted,
}

impl fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dispatched => "DISPATCHED",
            Self::Running => "RUNNING",
            Self::Collecting => "COLLECTING",
            Self::Synthesizing => "SYNTHESIZING",
            Self::Complete => "COMPLETE",
            Self::Aborted => "ABORTED",
        })
    }
}

impl DebatePhase {
    pub(crate) fn enter(self, subject: &str) {
        info!(phase = %self, "Debate {} -> {}", subject, self);
    }
}

/// Runs debates over a fixed roster of agent tasks
#[derive(Clone)]
pub struct DebateOrchestrator {
    tasks: Vec<Arc<AgentTask>>,
    fetcher: Arc<dyn MarketDataFetcher>,
    stream_buffer: usize,
}

impl DebateOrchestrator {
    /// Create an orchestrator over already-bound tasks
    pub fn new(tasks: Vec<AgentTask>, fetcher: Arc<dyn MarketDataFetcher>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(DebateError::Configuration(
                "a debate needs at least one agent".to_string(),
            ));
        }

        Ok(Self {
            tasks: tasks.into_iter().map(Arc::new).collect(),
            fetcher,
            stream_buffer: 32,
        })
    }

    /// Bind every roster entry to its first provider with credentials
    ///
    /// Agents with no usable provider, including ones with no choices at
    /// all, are skipped. Fails with [`DebateError::Configuration`] when no
    /// agent could be bound; no network call is made either way.
    pub fn from_config(
        config: &DebateConfig,
        settings: &ProviderSettings,
        fetcher: Arc<dyn MarketDataFetcher>,
    ) -> Result<Self> {
        config.validate()?;

        let prompts = Arc::new(PromptBuilder::new()?);
        let policy = RetryPolicy::new(config.max_attempts, config.backoff(), config.attempt_timeout());
        let mut clients: HashMap<ProviderKind, Arc<dyn LLMProvider>> = HashMap::new();
        let mut tasks = Vec::with_capacity(config.agents.len());

        for spec in &config.agents {
            let bound = bind(spec, |kind| match clients.get(&kind) {
                Some(client) => Ok(Some(Arc::clone(client))),
                None => connect(kind, settings, config.attempt_timeout()),
            });

            let Some((choice, client)) = bound else {
                warn!("No configured provider for {}, skipping agent", spec.identity.name);
                continue;
            };
            clients.insert(choice.provider, Arc::clone(&client));

            info!(
                "Bound {} to {}/{}",
                spec.identity.name,
                choice.provider.as_str(),
                choice.model()
            );
            let adapter = LlmAdapter::new(client, choice.model()).with_max_tokens(config.max_tokens);
            tasks.push(AgentTask::new(
                spec.identity.clone(),
                Arc::new(adapter),
                Arc::clone(&prompts),
                policy,
            ));
        }

        if tasks.is_empty() {
            let keys: Vec<&str> = ProviderKind::ALL.iter().map(|kind| kind.env_key()).collect();
            return Err(DebateError::Configuration(format!(
                "No LLM API keys configured. Set one of: {}",
                keys.join(", ")
            )));
        }

        Ok(Self::new(tasks, fetcher)?.with_stream_buffer(config.stream_buffer))
    }

    /// Capacity of the event channel behind [`Self::debate_stream`]
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }

    /// Participating agents in configured order
    pub fn agents(&self) -> impl Iterator<Item = &AgentIdentity> {
        self.tasks.iter().map(|task| task.identity())
    }

    /// Provider labels per agent, in configured order
    pub fn bindings(&self) -> Vec<(String, String)> {
        self.tasks
            .iter()
            .map(|task| (task.identity().name.clone(), task.provider().describe()))
            .collect()
    }

    /// Run a full debate and return the synthesized session
    #[instrument(skip(self, economic_context), fields(agents = self.tasks.len()))]
    pub async fn debate(&self, subject: &str, economic_context: Option<String>) -> DebateSession {
        let market = self.market_context(subject, economic_context).await;
        let outputs = self.collect(&market, None).await;
        Self::finish(market, outputs)
    }

    /// Run a debate, emitting progress events as they happen
    ///
    /// The debate runs on a spawned task. Dropping the stream does not cancel
    /// it: agents run to completion and later events are discarded.
    pub fn debate_stream(
        &self,
        subject: &str,
        economic_context: Option<String>,
    ) -> ReceiverStream<DebateEvent> {
        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let this = self.clone();
        let subject = subject.to_string();

        tokio::spawn(async move {
            this.drive_stream(&subject, economic_context, &tx).await;
        });

        ReceiverStream::new(rx)
    }

    #[instrument(skip(self, economic_context, tx), fields(agents = self.tasks.len()))]
    async fn drive_stream(
        &self,
        subject: &str,
        economic_context: Option<String>,
        tx: &mpsc::Sender<DebateEvent>,
    ) {
        emit(tx, DebateEvent::status(format!("Fetching market data for {subject}..."))).await;
        let market = self.market_context(subject, economic_context).await;
        emit(tx, DebateEvent::market_data(market.clone())).await;

        emit(
            tx,
            DebateEvent::status(format!("Starting {}-agent debate council...", self.tasks.len())),
        )
        .await;
        let outputs = self.collect(&market, Some(tx)).await;

        emit(tx, DebateEvent::status("Synthesizing debate results...")).await;
        let session = Self::finish(market, outputs);
        emit(tx, DebateEvent::complete(session)).await;
    }

    async fn market_context(&self, subject: &str, economic_context: Option<String>) -> MarketContext {
        match self.fetcher.get(subject).await {
            Ok(snapshot) => MarketContext::from_snapshot(subject, snapshot, economic_context),
            Err(e) => {
                warn!("Using synthetic market data for {}: {}", subject, e);
                MarketContext::synthetic(subject, economic_context)
            }
        }
    }

    /// Run every agent concurrently; outputs come back in configured order
    async fn collect(
        &self,
        market: &MarketContext,
        events: Option<&mpsc::Sender<DebateEvent>>,
    ) -> Vec<AgentOutput> {
        let shared = Arc::new(market.clone());
        let mut set = JoinSet::new();

        for (index, task) in self.tasks.iter().enumerate() {
            let task = Arc::clone(task);
            let market = Arc::clone(&shared);
            set.spawn(async move {
                let outcome = AssertUnwindSafe(task.run(&market)).catch_unwind().await;
                (index, outcome.map_err(panic_message))
            });
        }
        DebatePhase::Dispatched.enter(&market.subject);

        let mut slots: Vec<Option<AgentOutput>> = self.tasks.iter().map(|_| None).collect();
        DebatePhase::Running.enter(&market.subject);

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(output))) => {
                    debug!("{} finished ({} remaining)", output.agent_name(), set.len());
                    if let Some(tx) = events {
                        emit(tx, DebateEvent::agent_result(output.clone())).await;
                    }
                    slots[index] = Some(output);
                }
                Ok((index, Err(message))) => {
                    let name = self.tasks[index].identity().name.clone();
                    error!("Agent {} panicked: {}", name, message);
                    report_failure(events, message, Some(name)).await;
                }
                Err(e) => {
                    error!("Agent task could not be joined: {}", e);
                    report_failure(events, format!("agent task could not be joined: {e}"), None).await;
                }
            }
        }
        DebatePhase::Collecting.enter(&market.subject);

        slots
            .into_iter()
            .zip(&self.tasks)
            .map(|(slot, task)| slot.unwrap_or_else(|| fallback_output(task.identity(), market)))
            .collect()
    }

    fn finish(market: MarketContext, outputs: Vec<AgentOutput>) -> DebateSession {
        DebatePhase::Synthesizing.enter(&market.subject);
        let session = synthesize(market, outputs);
        DebatePhase::Complete.enter(&session.subject);
        info!(
            "Debate for {} complete: {}/{} agents HIGH confidence",
            session.subject,
            session.high_confidence_count(),
            session.agent_outputs.len()
        );
        session
    }
}

/// First choice of `spec` that yields a client
///
/// A choice whose client cannot be built is logged and skipped like one
/// without credentials.
fn bind<'a, F>(spec: &'a AgentSpec, mut connector: F) -> Option<(&'a ProviderChoice, Arc<dyn LLMProvider>)>
where
    F: FnMut(ProviderKind) -> council_llm::Result<Option<Arc<dyn LLMProvider>>>,
{
    for choice in &spec.providers {
        match connector(choice.provider) {
            Ok(Some(client)) => return Some((choice, client)),
            Ok(None) => {}
            Err(e) => warn!(
                "Could not build {} client for {}: {}",
                choice.provider.as_str(),
                spec.identity.name,
                e
            ),
        }
    }
    None
}

/// Surface a lost agent to stream consumers; its slot gets the fallback
async fn report_failure(events: Option<&mpsc::Sender<DebateEvent>>, message: String, agent: Option<String>) {
    if let Some(tx) = events {
        emit(tx, DebateEvent::error(message, agent)).await;
    }
}

/// Send an event, ignoring a dropped receiver
pub(crate) async fn emit(tx: &mpsc::Sender<DebateEvent>, event: DebateEvent) {
    if tx.send(event).await.is_err() {
        debug!("Event receiver dropped; discarding event");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "agent task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MockMarketDataFetcher;
    use crate::model::{Confidence, Direction, MarketSnapshot, Stance};
    use crate::provider::testing::{ScriptedLlm, Step, agent_json};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    const ROSTER: [(&str, Stance); 5] = [
        ("Hawk", Stance::Macro),
        ("Forensic", Stance::Fundamental),
        ("Flow", Stance::Flow),
        ("Tech", Stance::Technical),
        ("Skeptic", Stance::Skeptic),
    ];

    fn fetcher() -> Arc<dyn MarketDataFetcher> {
        let mut mock = MockMarketDataFetcher::new();
        mock.expect_get()
            .returning(|_| Ok(MarketSnapshot::new(182.5, 2.5, 70_000_000)));
        Arc::new(mock)
    }

    fn task(name: &str, stance: Stance, llm: Arc<ScriptedLlm>) -> AgentTask {
        AgentTask::new(
            AgentIdentity::new(name, "analyst", 0.5).with_stance(stance),
            Arc::new(LlmAdapter::new(llm, "model")),
            Arc::new(PromptBuilder::new().unwrap()),
            RetryPolicy::new(2, Duration::from_millis(500), Duration::from_secs(10)),
        )
    }

    /// One scripted provider per roster entry
    fn council(steps: Vec<Step>) -> (DebateOrchestrator, Vec<Arc<ScriptedLlm>>) {
        let llms: Vec<Arc<ScriptedLlm>> = steps
            .into_iter()
            .map(|step| Arc::new(ScriptedLlm::new(vec![step])))
            .collect();
        let tasks = ROSTER
            .iter()
            .zip(&llms)
            .map(|((name, stance), llm)| task(name, *stance, Arc::clone(llm)))
            .collect();
        (DebateOrchestrator::new(tasks, fetcher()).unwrap(), llms)
    }

    fn high(name: &str) -> Step {
        Step::Reply(agent_json(&format!("{name} sees catalysts"), "high"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_outputs_in_configured_order() {
        let steps = ROSTER
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                let delay = Duration::from_millis(500 - 100 * i as u64);
                Step::ReplyAfter(delay, agent_json(&format!("{name} view"), "moderate"))
            })
            .collect();
        let (orchestrator, _) = council(steps);

        let session = orchestrator.debate("AAPL", None).await;
        let names: Vec<&str> = session.agent_outputs.iter().map(AgentOutput::agent_name).collect();
        assert_eq!(names, ["Hawk", "Forensic", "Flow", "Tech", "Skeptic"]);
        assert_eq!(session.market_context.direction, Direction::Up);
        assert!(!session.market_context.synthetic);
        assert!(session.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_agent_falls_back() {
        let (orchestrator, llms) =
            council(vec![high("Hawk"), high("Forensic"), Step::Hang, high("Tech"), high("Skeptic")]);

        let session = orchestrator.debate("AAPL", None).await;

        assert_eq!(session.agent_outputs.len(), 5);
        let flow = &session.agent_outputs[2];
        assert!(flow.is_fallback());
        assert_eq!(flow.confidence(), Confidence::Moderate);
        assert_eq!(
            flow.thesis(),
            "Institutional flow patterns showing 2.50% move in AAPL with above-average volume."
        );
        assert_eq!(llms[2].calls(), 2);

        assert_eq!(session.high_confidence_count(), 4);
        assert_eq!(session.consensus_points[0].statement, "4 of 5 agents show HIGH confidence");
        assert!(!session.consensus_points[0].supporting_agents.contains(&"Flow".to_string()));
        assert_eq!(session.disagreement_points.len(), 1);
        assert!(session.summary.contains("4/5 agents show high confidence."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_matches_batch() {
        let steps = || {
            ROSTER
                .iter()
                .zip([300, 100, 200, 500, 400])
                .map(|((name, _), ms)| {
                    Step::ReplyAfter(Duration::from_millis(ms), agent_json(&format!("{name} view"), "high"))
                })
                .collect::<Vec<_>>()
        };
        let (batch_orchestrator, _) = council(steps());
        let (stream_orchestrator, _) = council(steps());

        let batch = batch_orchestrator.debate("NVDA", Some("FOMC at 2pm".to_string())).await;
        let events: Vec<DebateEvent> = stream_orchestrator
            .debate_stream("NVDA", Some("FOMC at 2pm".to_string()))
            .collect()
            .await;

        assert_eq!(events[0], DebateEvent::status("Fetching market data for NVDA..."));
        assert!(matches!(&events[1], DebateEvent::MarketData { data } if data.subject == "NVDA"));
        assert_eq!(events[2], DebateEvent::status("Starting 5-agent debate council..."));

        let completion_order: Vec<&str> = events
            .iter()
            .filter_map(|event| match event {
                DebateEvent::AgentResult { agent, .. } => Some(agent.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(completion_order, ["Forensic", "Flow", "Hawk", "Skeptic", "Tech"]);

        assert_eq!(events[8], DebateEvent::status("Synthesizing debate results..."));
        assert_eq!(events.len(), 10);

        let mut streamed = events.into_iter().next_back().and_then(DebateEvent::into_session).unwrap();
        streamed.id = batch.id;
        streamed.timestamp = batch.timestamp;
        assert_eq!(streamed, batch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_agent_reports_error_and_falls_back() {
        let (orchestrator, _) =
            council(vec![high("Hawk"), Step::Panic, high("Flow"), high("Tech"), high("Skeptic")]);

        let events: Vec<DebateEvent> = orchestrator.debate_stream("AMD", None).collect().await;

        let errors: Vec<&DebateEvent> = events
            .iter()
            .filter(|event| matches!(event, DebateEvent::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            DebateEvent::Error { message, agent: Some(agent) }
                if agent == "Forensic" && message == "scripted provider panic"
        ));

        let session = events.into_iter().next_back().and_then(DebateEvent::into_session).unwrap();
        assert_eq!(session.agent_outputs.len(), 5);
        assert!(session.agent_outputs[1].is_fallback());
        assert_eq!(session.high_confidence_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_stream_runs_to_completion() {
        let (orchestrator, llms) = council(vec![
            high("Hawk"),
            high("Forensic"),
            high("Flow"),
            high("Tech"),
            high("Skeptic"),
        ]);

        let mut stream = orchestrator.debate_stream("META", None);
        let first = stream.next().await;
        assert!(matches!(first, Some(DebateEvent::Status { .. })));
        drop(stream);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(llms.iter().all(|llm| llm.calls() == 1));
    }

    #[tokio::test]
    async fn test_market_failure_uses_synthetic_snapshot() {
        let mut mock = MockMarketDataFetcher::new();
        mock.expect_get().times(1).returning(|subject| {
            Err(DebateError::UpstreamData {
                symbol: subject.to_string(),
                reason: "no quotes".to_string(),
            })
        });
        let llm = Arc::new(ScriptedLlm::replying(agent_json("Solo view", "low")));
        let orchestrator =
            DebateOrchestrator::new(vec![task("Solo", Stance::Other, llm)], Arc::new(mock)).unwrap();

        let session = orchestrator.debate("ZZZZ", None).await;
        assert!(session.market_context.synthetic);
        assert_eq!(session.market_context.price, 150.0);
        assert_eq!(session.market_context.volume, 50_000_000);
        assert_eq!(session.agent_outputs.len(), 1);
        assert_eq!(session.consensus_points.len(), 1);
        assert_eq!(session.disagreement_points.len(), 1);
    }

    #[test]
    fn test_empty_roster_rejected() {
        assert!(matches!(
            DebateOrchestrator::new(Vec::new(), fetcher()),
            Err(DebateError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_config_without_keys() {
        let result =
            DebateOrchestrator::from_config(&DebateConfig::default(), &ProviderSettings::default(), fetcher());
        match result {
            Err(DebateError::Configuration(msg)) => {
                assert!(msg.starts_with("No LLM API keys configured"));
                assert!(msg.contains("OPENROUTER_API_KEY"));
            }
            _ => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_from_config_binds_first_available_provider() {
        let settings = ProviderSettings::default().with_key(ProviderKind::Groq, "gsk-test");
        let orchestrator =
            DebateOrchestrator::from_config(&DebateConfig::default(), &settings, fetcher()).unwrap();

        // The skeptic only accepts Mistral or Gemini
        let bindings = orchestrator.bindings();
        assert_eq!(bindings.len(), 4);
        assert!(bindings.iter().all(|(_, provider)| provider == "groq/llama-3.1-8b-instant"));
        assert!(orchestrator.agents().all(|agent| agent.stance != Stance::Skeptic));
    }

    #[test]
    fn test_from_config_prefers_earlier_choice() {
        let config = DebateConfig::builder()
            .agent(AgentSpec::new(
                AgentIdentity::new("Solo", "analyst", 0.5),
                vec![
                    ProviderChoice::with_model(ProviderKind::OpenRouter, "meta-llama/llama-3.3-70b-instruct"),
                    ProviderChoice::new(ProviderKind::Gemini),
                ],
            ))
            .build()
            .unwrap();
        let settings = ProviderSettings::default()
            .with_key(ProviderKind::Gemini, "g")
            .with_key(ProviderKind::OpenRouter, "o");

        let orchestrator = DebateOrchestrator::from_config(&config, &settings, fetcher()).unwrap();
        assert_eq!(
            orchestrator.bindings(),
            [("Solo".to_string(), "openrouter/meta-llama/llama-3.3-70b-instruct".to_string())]
        );
    }

    #[test]
    fn test_from_config_skips_agent_without_choices() {
        let config = DebateConfig::builder()
            .agent(AgentSpec::new(
                AgentIdentity::new("Bound", "analyst", 0.5),
                vec![ProviderChoice::new(ProviderKind::Groq)],
            ))
            .agent(AgentSpec::new(AgentIdentity::new("Unbound", "analyst", 0.5), vec![]))
            .build()
            .unwrap();
        let settings = ProviderSettings::default().with_key(ProviderKind::Groq, "gsk-test");

        let orchestrator = DebateOrchestrator::from_config(&config, &settings, fetcher()).unwrap();
        let bindings = orchestrator.bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].0, "Bound");
    }

    #[test]
    fn test_bind_moves_past_failed_client() {
        let spec = AgentSpec::new(
            AgentIdentity::new("Solo", "analyst", 0.5),
            vec![
                ProviderChoice::new(ProviderKind::Groq),
                ProviderChoice::new(ProviderKind::OpenRouter),
                ProviderChoice::new(ProviderKind::Mistral),
            ],
        );
        let mut tried = Vec::new();

        let bound = bind(&spec, |kind| {
            tried.push(kind);
            match kind {
                ProviderKind::Groq => Err(council_llm::LLMError::ConfigurationError("bad TLS backend".to_string())),
                ProviderKind::OpenRouter => Ok(None),
                _ => Ok(Some(Arc::new(ScriptedLlm::replying("{}")) as Arc<dyn LLMProvider>)),
            }
        });

        let (choice, _) = bound.unwrap();
        assert_eq!(choice.provider, ProviderKind::Mistral);
        assert_eq!(tried, [ProviderKind::Groq, ProviderKind::OpenRouter, ProviderKind::Mistral]);

        let nothing = bind(&spec, |_| Err(council_llm::LLMError::ConfigurationError("down".to_string())));
        assert!(nothing.is_none());
    }

    #[tokio::test]
    async fn test_report_failure_emits_error_event() {
        let (tx, mut rx) = mpsc::channel(4);
        report_failure(Some(&tx), "agent task could not be joined: cancelled".to_string(), None).await;
        report_failure(Some(&tx), "boom".to_string(), Some("Hawk".to_string())).await;
        report_failure(None, "batch mode".to_string(), None).await;
        drop(tx);

        assert_eq!(
            rx.recv().await,
            Some(DebateEvent::error("agent task could not be joined: cancelled", None))
        );
        assert_eq!(rx.recv().await, Some(DebateEvent::error("boom", Some("Hawk".to_string()))));
        assert_eq!(rx.recv().await, None);
    }
}
