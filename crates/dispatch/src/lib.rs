//! Dispatch orchestration.
//!
//! Ties routing, rendering, and the channel adapters together: one
//! [`DispatchOrchestrator::dispatch`] call takes a prepared [`DispatchJob`]
//! to a terminal [`DispatchOutcome`] with every delivery attempt recorded.

pub mod orchestrator;

pub use orchestrator::{BatchSummary, DispatchJob, DispatchOrchestrator, DispatchOutcome};
