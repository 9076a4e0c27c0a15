//! Idea research pipeline.
//!
//! A run moves through these stages, strictly in order:
//! 1. **Fan-out**: a fixed battery of search queries, results deduplicated by URL
//! 2. **Synthesis**: one model call turns the context into idea candidates
//! 3. **Verification**: per-idea searches until sources span enough domains
//! 4. **Dedupe**: content fingerprints against history and the batch itself
//! 5. **Shortlist**: ranked, verified ideas, checked for focus-market saturation
//! 6. **Persistence**: rows and a summary document per run

pub mod dedupe;
pub mod engine;
pub mod extraction;
pub mod fanout;
pub mod pipeline;
pub mod ranking;
pub mod saturation;
pub mod synthesis;
pub mod verification;

pub use engine::{ResearchEngine, ResearchOutput};
pub use pipeline::{Pipeline, RunReport, RunStats};
pub use synthesis::Synthesizer;
pub use verification::{SweepStats, VerificationState, VerificationSweep};
