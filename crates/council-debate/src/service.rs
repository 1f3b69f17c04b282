//! Caller-facing debate service: store lookup, debate, store write

use crate::config::{DebateConfig, ProviderSettings};
use crate::error::{DebateError, Result};
use crate::events::DebateEvent;
use crate::market::MarketDataFetcher;
use crate::model::DebateSession;
use crate::orchestrator::{DebateOrchestrator, DebatePhase, emit};
use crate::store::DebateStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

enum Council {
    Ready(DebateOrchestrator),
    Unavailable(String),
}

/// Debates with a session store in front
///
/// When no agent could be bound the service still answers, with an
/// unavailable session instead of an error.
pub struct DebateService {
    council: Council,
    store: Arc<dyn DebateStore>,
    stream_buffer: usize,
}

impl DebateService {
    pub fn new(orchestrator: DebateOrchestrator, store: Arc<dyn DebateStore>) -> Self {
        Self {
            council: Council::Ready(orchestrator),
            store,
            stream_buffer: 32,
        }
    }

    /// Build the orchestrator from configuration
    ///
    /// A configuration failure puts the service in unavailable mode; other
    /// errors are returned.
    pub fn from_config(
        config: &DebateConfig,
        settings: &ProviderSettings,
        fetcher: Arc<dyn MarketDataFetcher>,
        store: Arc<dyn DebateStore>,
    ) -> Result<Self> {
        let council = match DebateOrchestrator::from_config(config, settings, fetcher) {
            Ok(orchestrator) => Council::Ready(orchestrator),
            Err(DebateError::Configuration(reason)) => {
                warn!("LLM council unavailable: {}", reason);
                Council::Unavailable(reason)
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            council,
            store,
            stream_buffer: config.stream_buffer,
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self.council, Council::Ready(_))
    }

    pub fn orchestrator(&self) -> Option<&DebateOrchestrator> {
        match &self.council {
            Council::Ready(orchestrator) => Some(orchestrator),
            Council::Unavailable(_) => None,
        }
    }

    /// Stored session if fresh, otherwise a new debate
    #[instrument(skip(self, economic_context))]
    pub async fn analyze(&self, subject: &str, economic_context: Option<String>) -> Result<DebateSession> {
        let orchestrator = match &self.council {
            Council::Ready(orchestrator) => orchestrator,
            Council::Unavailable(reason) => return Ok(DebateSession::unavailable(subject, reason)),
        };

        if let Some(session) = self.store.get(subject).await? {
            info!("Using cached debate for {}", subject);
            return Ok(session);
        }

        let session = orchestrator.debate(subject, economic_context).await;
        self.store.put(session.clone()).await?;
        Ok(session)
    }

    /// Streaming variant of [`Self::analyze`]
    ///
    /// A store hit yields a status event and the stored session. An
    /// unavailable council yields a single error event. Otherwise the
    /// orchestrator's events are forwarded and the final session is stored.
    pub async fn analyze_stream(
        &self,
        subject: &str,
        economic_context: Option<String>,
    ) -> Result<ReceiverStream<DebateEvent>> {
        let orchestrator = match &self.council {
            Council::Ready(orchestrator) => orchestrator,
            Council::Unavailable(reason) => {
                DebatePhase::Aborted.enter(subject);
                let (tx, rx) = mpsc::channel(1);
                emit(&tx, DebateEvent::error(format!("LLM Council Unavailable: {reason}"), None)).await;
                return Ok(ReceiverStream::new(rx));
            }
        };

        if let Some(session) = self.store.get(subject).await? {
            info!("Using cached debate for {}", subject);
            let (tx, rx) = mpsc::channel(2);
            emit(&tx, DebateEvent::status("Using cached analysis (fast path)...")).await;
            emit(&tx, DebateEvent::complete(session)).await;
            return Ok(ReceiverStream::new(rx));
        }

        let mut upstream = orchestrator.debate_stream(subject, economic_context);
        let (tx, rx) = mpsc::channel(self.stream_buffer.max(1));
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            while let Some(event) = upstream.next().await {
                if let DebateEvent::DebateComplete { data } = &event {
                    if let Err(e) = store.put(data.as_ref().clone()).await {
                        warn!("Could not store debate for {}: {}", data.subject, e);
                    }
                }
                emit(&tx, event).await;
            }
            debug!("Debate stream forwarding finished");
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Drop the stored session for `subject`
    pub async fn invalidate(&self, subject: &str) -> Result<()> {
        self.store.invalidate(subject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentTask;
    use crate::market::MockMarketDataFetcher;
    use crate::model::{AgentIdentity, DebateStatus, MarketSnapshot};
    use crate::prompts::PromptBuilder;
    use crate::provider::LlmAdapter;
    use crate::provider::testing::{ScriptedLlm, agent_json};
    use crate::retry::RetryPolicy;
    use crate::store::TimedDebateStore;

    fn fetcher() -> Arc<dyn MarketDataFetcher> {
        let mut mock = MockMarketDataFetcher::new();
        mock.expect_get()
            .returning(|_| Ok(MarketSnapshot::new(98.0, -1.1, 5_000_000)));
        Arc::new(mock)
    }

    fn service(llm: Arc<ScriptedLlm>) -> (DebateService, Arc<TimedDebateStore>) {
        let task = AgentTask::new(
            AgentIdentity::new("Solo", "analyst", 0.5),
            Arc::new(LlmAdapter::new(llm, "model")),
            Arc::new(PromptBuilder::new().unwrap()),
            RetryPolicy::no_retry(),
        );
        let orchestrator = DebateOrchestrator::new(vec![task], fetcher()).unwrap();
        let store = Arc::new(TimedDebateStore::default());
        (DebateService::new(orchestrator, store.clone()), store)
    }

    fn unavailable_service() -> DebateService {
        DebateService::from_config(
            &DebateConfig::default(),
            &ProviderSettings::default(),
            fetcher(),
            Arc::new(TimedDebateStore::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_analyze_stores_and_reuses() {
        let llm = Arc::new(ScriptedLlm::replying(agent_json("Solo view", "high")));
        let (service, store) = service(llm.clone());

        let first = service.analyze("intc", None).await.unwrap();
        assert_eq!(first.status, DebateStatus::Complete);
        assert_eq!(llm.calls(), 1);
        assert_eq!(store.len().await, 1);

        let second = service.analyze("INTC", None).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(llm.calls(), 1);

        service.invalidate("INTC").await.unwrap();
        service.analyze("INTC", None).await.unwrap();
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_stream_stores_final_session_then_hits_cache() {
        let llm = Arc::new(ScriptedLlm::replying(agent_json("Solo view", "low")));
        let (service, store) = service(llm.clone());

        let events: Vec<DebateEvent> = service.analyze_stream("QQQ", None).await.unwrap().collect().await;
        let live = events.into_iter().next_back().and_then(DebateEvent::into_session).unwrap();
        assert_eq!(store.get("QQQ").await.unwrap(), Some(live.clone()));

        let cached: Vec<DebateEvent> = service.analyze_stream("qqq", None).await.unwrap().collect().await;
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0], DebateEvent::status("Using cached analysis (fast path)..."));
        assert_eq!(cached[1], DebateEvent::complete(live));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_without_providers() {
        let service = unavailable_service();
        assert!(!service.is_available());
        assert!(service.orchestrator().is_none());

        let session = service.analyze("AAPL", None).await.unwrap();
        assert_eq!(session.status, DebateStatus::Unavailable);
        assert!(session.agent_outputs.is_empty());
        assert!(session.summary.starts_with("⚠️ LLM Council Unavailable: No LLM API keys configured"));
    }

    #[tokio::test]
    async fn test_unavailable_stream_is_single_error() {
        let events: Vec<DebateEvent> = unavailable_service()
            .analyze_stream("AAPL", None)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            DebateEvent::Error { message, agent: None } if message.starts_with("LLM Council Unavailable")
        ));
    }
}
