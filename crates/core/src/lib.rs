//! Domain logic for the analysis orchestration service.
//!
//! Pure types and functions only, with no I/O, database, or HTTP. The
//! orchestrator, persistence, and API crates all build on this crate.

pub mod consolidation;
pub mod error;
pub mod fusion;
pub mod job;
pub mod types;
