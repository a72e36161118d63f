//! Application layer containing the split-tender protocol itself.
//!
//! This module defines the `SplitTenderOrchestrator`, the primary entry
//! point for simulating and committing split charges. It owns the two
//! collaborator ports and sequences the legs so every commit ends
//! captured, compensated, or flagged for reconciliation.

pub mod orchestrator;
