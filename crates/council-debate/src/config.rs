//! Configuration for debate operations

use crate::error::{DebateError, Result};
use crate::model::{AgentIdentity, Stance};
use council_utils::{env_or, env_string};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Hosted text-generation backends an agent can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenRouter,
    Groq,
    Mistral,
    Gemini,
    Anthropic,
    OpenAI,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        Self::OpenRouter,
        Self::Groq,
        Self::Mistral,
        Self::Gemini,
        Self::Anthropic,
        Self::OpenAI,
    ];

    /// Environment variable holding this provider's API key
    pub fn env_key(self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Mistral => "MISTRAL_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Model used when a provider choice does not name one
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenRouter => "mistralai/mistral-7b-instruct",
            Self::Groq => "llama-3.1-8b-instant",
            Self::Mistral => "mistral-small-latest",
            Self::Gemini => "gemini-2.0-flash",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::OpenAI => "gpt-4o-mini",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Groq => "groq",
            Self::Mistral => "mistral",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }
}

/// One entry of an agent's provider preference list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderChoice {
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderChoice {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: None,
        }
    }

    pub fn with_model(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: Some(model.into()),
        }
    }

    /// Configured model, or the provider's default
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// A roster entry: who the agent is and which providers may serve it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    #[serde(flatten)]
    pub identity: AgentIdentity,
    /// Tried in order; the first one with credentials wins
    pub providers: Vec<ProviderChoice>,
}

impl AgentSpec {
    pub fn new(identity: AgentIdentity, providers: Vec<ProviderChoice>) -> Self {
        Self {
            identity,
            providers,
        }
    }
}

/// Five-agent council: four analysts and a skeptic
pub fn default_roster() -> Vec<AgentSpec> {
    use ProviderKind::{Gemini, Groq, Mistral, OpenRouter};

    let analyst_models = |model: &str| {
        vec![
            ProviderChoice::with_model(OpenRouter, model),
            ProviderChoice::new(Groq),
        ]
    };

    vec![
        AgentSpec::new(
            AgentIdentity::new("🦅 Macro Hawk", "Macroeconomic analyst", 0.6).with_stance(Stance::Macro),
            analyst_models("mistralai/mistral-7b-instruct"),
        ),
        AgentSpec::new(
            AgentIdentity::new("🔬 Micro Forensic", "Fundamental analyst", 0.6)
                .with_stance(Stance::Fundamental),
            analyst_models("gryphe/mythomax-l2-13b"),
        ),
        AgentSpec::new(
            AgentIdentity::new("💧 Flow Detective", "Market microstructure expert", 0.7)
                .with_stance(Stance::Flow),
            analyst_models("mistralai/mistral-7b-instruct"),
        ),
        AgentSpec::new(
            AgentIdentity::new("📊 Tech Interpreter", "Technical analyst", 0.7)
                .with_stance(Stance::Technical),
            analyst_models("gryphe/mythomax-l2-13b"),
        ),
        AgentSpec::new(
            AgentIdentity::new("🤔 Skeptic", "Critical risk analyst", 0.8).with_stance(Stance::Skeptic),
            vec![ProviderChoice::new(Mistral), ProviderChoice::new(Gemini)],
        ),
    ]
}

/// Configuration for a debate council
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebateConfig {
    /// Roster in configured order
    pub agents: Vec<AgentSpec>,

    /// Provider calls per agent before falling back
    pub max_attempts: u32,

    /// Time budget for a single provider call
    pub attempt_timeout_secs: u64,

    /// Fixed pause between attempts
    pub backoff_ms: u64,

    /// How long a finished session stays in the store
    pub cache_ttl_secs: u64,

    /// Generation budget per call
    pub max_tokens: usize,

    /// Capacity of the streaming event channel
    pub stream_buffer: usize,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            agents: default_roster(),
            max_attempts: 2,
            attempt_timeout_secs: 30,
            backoff_ms: 500,
            cache_ttl_secs: 600,
            max_tokens: 800,
            stream_buffer: 32,
        }
    }
}

impl DebateConfig {
    /// Create a new configuration builder
    pub fn builder() -> DebateConfigBuilder {
        DebateConfigBuilder::default()
    }

    /// Defaults overridden by `COUNCIL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_attempts: env_or("COUNCIL_MAX_ATTEMPTS", defaults.max_attempts)?,
            attempt_timeout_secs: env_or(
                "COUNCIL_ATTEMPT_TIMEOUT_SECS",
                defaults.attempt_timeout_secs,
            )?,
            backoff_ms: env_or("COUNCIL_BACKOFF_MS", defaults.backoff_ms)?,
            cache_ttl_secs: env_or("COUNCIL_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(DebateError::Configuration(
                "at least one agent must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for spec in &self.agents {
            let name = spec.identity.name.trim();
            if name.is_empty() {
                return Err(DebateError::Configuration(
                    "agent names must not be empty".to_string(),
                ));
            }
            if !names.insert(name) {
                return Err(DebateError::Configuration(format!(
                    "duplicate agent name: {name}"
                )));
            }
            if !(0.0..=2.0).contains(&spec.identity.temperature) {
                return Err(DebateError::Configuration(format!(
                    "temperature for {name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.max_attempts == 0 {
            return Err(DebateError::Configuration(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.attempt_timeout_secs == 0 {
            return Err(DebateError::Configuration(
                "attempt_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.stream_buffer == 0 {
            return Err(DebateError::Configuration(
                "stream_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Builder for DebateConfig
#[derive(Debug, Default)]
pub struct DebateConfigBuilder {
    agents: Option<Vec<AgentSpec>>,
    max_attempts: Option<u32>,
    attempt_timeout: Option<Duration>,
    backoff: Option<Duration>,
    cache_ttl: Option<Duration>,
    max_tokens: Option<usize>,
    stream_buffer: Option<usize>,
}

impl DebateConfigBuilder {
    /// Replace the roster
    pub fn agents(mut self, agents: Vec<AgentSpec>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Append one agent to the roster (starting from an empty one)
    pub fn agent(mut self, agent: AgentSpec) -> Self {
        self.agents.get_or_insert_with(Vec::new).push(agent);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = Some(capacity);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<DebateConfig> {
        let defaults = DebateConfig::default();

        let config = DebateConfig {
            agents: self.agents.unwrap_or(defaults.agents),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            attempt_timeout_secs: self
                .attempt_timeout
                .map_or(defaults.attempt_timeout_secs, |d| d.as_secs()),
            backoff_ms: self
                .backoff
                .map_or(defaults.backoff_ms, |d| d.as_millis() as u64),
            cache_ttl_secs: self
                .cache_ttl
                .map_or(defaults.cache_ttl_secs, |d| d.as_secs()),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            stream_buffer: self.stream_buffer.unwrap_or(defaults.stream_buffer),
        };

        config.validate()?;
        Ok(config)
    }
}

/// API credentials for every provider kind
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    keys: HashMap<ProviderKind, String>,
    openai_api_base: Option<String>,
}

impl ProviderSettings {
    /// Read every known `*_API_KEY` variable plus `OPENAI_API_BASE`
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        for kind in ProviderKind::ALL {
            if let Some(key) = env_string(kind.env_key())? {
                settings.keys.insert(kind, key);
            }
        }
        settings.openai_api_base = env_string("OPENAI_API_BASE")?;
        Ok(settings)
    }

    pub fn with_key(mut self, kind: ProviderKind, key: impl Into<String>) -> Self {
        self.keys.insert(kind, key.into());
        self
    }

    pub fn with_openai_api_base(mut self, base: impl Into<String>) -> Self {
        self.openai_api_base = Some(base.into());
        self
    }

    pub fn key(&self, kind: ProviderKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    pub fn openai_api_base(&self) -> Option<&str> {
        self.openai_api_base.as_deref()
    }

    /// Providers with credentials, in [`ProviderKind::ALL`] order
    pub fn configured(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.keys.contains_key(kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
