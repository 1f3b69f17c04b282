//! Text-generation provider abstraction for council-rs
//!
//! This crate provides provider-agnostic abstractions for single-shot text
//! generation against Large Language Models. It includes:
//!
//! - Message types for LLM communication
//! - Completion request/response types
//! - Provider trait for LLM implementations
//! - Concrete provider implementations (behind feature flags)
//!
//! Every call is a single attempt. Retry, timeout budgets and fallbacks are
//! the caller's concern.

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(any(feature = "openai", feature = "anthropic"))]
pub mod providers;
