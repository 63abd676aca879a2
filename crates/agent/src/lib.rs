//! Search agents - LLM-backed routing and specialist dispatch
//!
//! This crate is the reasoning half of shopbrain. A natural-language shopping query goes through
//! a constrained loop:
//! 1. **Classification** (`router`) - the LLM turns the query into a validated `SearchPlan`
//! 2. **Dispatch** (`runtime`) - the plan's route selects exactly one specialist
//! 3. **Retrieval** (`specialists`, `analytics`) - structured queries go to the storefront backend
//!
//! # Key Types
//!
//! - `SearchRuntime` - the dispatcher, built once and shared across requests
//! - `LlmClient` - pluggable transport for Ollama or OpenAI-compatible endpoints
//! - `AnalyticsBackend` - the only path to stored user events
//!
//! # Safety Principle
//!
//! The LLM only classifies. It never writes queries against storage; every lookup is a
//! deterministic `StructuredQuery` built from the validated plan.

pub mod analytics;
pub mod llm;
pub mod router;
pub mod runtime;
pub mod specialists;

pub use analytics::{AnalyticsBackend, HttpAnalyticsClient, ServiceError};
pub use llm::{build_llm_client, LlmClient, LlmError, LlmRequest, ScriptedLlmClient};
pub use router::{ClassificationError, IntentClassifier, LlmRouter};
pub use runtime::{ResultSource, SearchError, SearchOutcome, SearchRuntime};
pub use specialists::{OrdersBackend, ProductSearch, UsersAgent};
