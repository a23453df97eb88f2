//! Aggregation engine for dialtrace.
//!
//! Runs source adapters under timeouts, retries and a shared cache, either
//! one at a time ([`sequential`]) or in concurrent priority groups
//! ([`orchestrator`]). [`Investigator`] wires both to a
//! [`HistoryStore`](dialtrace_core::store::HistoryStore) and the pattern
//! engine.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod insights;
pub mod investigator;
pub mod orchestrator;
pub mod retry;
pub mod runner;
pub mod sequential;

#[cfg(test)]
mod tests;

pub use config::{EngineConfig, OrchestratorConfig};
pub use investigator::{InvestigationReport, Investigator};
pub use orchestrator::{Progress, RunOptions};
