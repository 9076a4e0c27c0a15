//! # Pearl Core
//!
//! Core library for Pearl, a research pipeline for real-estate marketing
//! ideas. Provides search fan-out, model synthesis, multi-source
//! verification, dedupe and ranking, run persistence, the idea assistant,
//! the auto-runner and the HTTP API.

pub mod assistant;
pub mod compliance;
pub mod config;
pub mod countries;
pub mod error;
pub mod gateway;
pub mod pacing;
pub mod persistence;
pub mod providers;
pub mod research;
pub mod runner;
pub mod search;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root.
pub use assistant::{AssistantReply, ExperimentPack, IdeaAssistant};
pub use config::{PearlConfig, load_config};
pub use countries::Country;
pub use error::{PearlError, Result};
pub use providers::{MockTextGenerator, TextGenerator};
pub use research::{Pipeline, ResearchEngine, RunReport, RunStats, VerificationState};
pub use runner::{AutoRunner, RunnerReport, RunnerState, RunnerStatus};
pub use search::{MockSearchProvider, SearchProvider};
pub use store::{BlobStore, LocalStore, MemoryStore, RowStore};
pub use types::{IdeaCandidate, ProofPack, Saturation, SearchResult};
