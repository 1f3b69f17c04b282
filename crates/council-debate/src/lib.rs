//! Concurrent multi-agent debate engine for market moves
//!
//! A subject (usually a ticker) is handed to N independent analyst agents,
//! each bound to its own hosted LLM. Agents run concurrently under their own
//! timeout and retry budget and fall back to a deterministic opinion when
//! their provider fails. The finished outputs are synthesized into consensus
//! points, disagreement points and a summary.
//!
//! # Architecture
//!
//! - [`DebateOrchestrator`]: fans agents out, gathers outputs in configured
//!   order, batch or streaming
//! - [`AgentTask`]: prompt, provider call, sanitize, normalize, retry, fallback
//! - [`sanitizer`]: turns noisy model replies into structured JSON
//! - [`consensus`]: pure synthesis over the finished outputs
//! - [`DebateService`]: store lookup in front of the orchestrator
//!
//! # Example
//!
//! ```rust,ignore
//! use council_debate::{DebateConfig, DebateService, ProviderSettings, TimedDebateStore, YahooMarketData};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DebateConfig::from_env()?;
//!     let settings = ProviderSettings::from_env()?;
//!
//!     let service = DebateService::from_config(
//!         &config,
//!         &settings,
//!         Arc::new(YahooMarketData::new()),
//!         Arc::new(TimedDebateStore::new(config.cache_ttl())),
//!     )?;
//!
//!     let session = service.analyze("AAPL", None).await?;
//!     println!("{}", session.summary);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod consensus;
pub mod error;
pub mod events;
pub mod market;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod retry;
pub mod sanitizer;
pub mod service;
pub mod store;

// Re-export main types for convenience
pub use agent::AgentTask;
pub use config::{AgentSpec, DebateConfig, ProviderChoice, ProviderKind, ProviderSettings};
pub use error::{DebateError, ParseError, ProviderError, ProviderErrorKind, Result};
pub use events::DebateEvent;
pub use market::{MarketDataFetcher, YahooMarketData};
pub use model::{
    AgentIdentity, AgentOutput, Confidence, ConsensusPoint, DebateSession, DebateStatus,
    Direction, DisagreementPoint, EvidenceStrength, MarketContext, MarketSnapshot, Stance,
    Viewpoint,
};
pub use orchestrator::{DebateOrchestrator, DebatePhase};
pub use provider::{GenerationProvider, LlmAdapter};
pub use retry::RetryPolicy;
pub use service::DebateService;
pub use store::{DebateStore, TimedDebateStore};
