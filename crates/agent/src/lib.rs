//! Agent Runtime - autonomous remediation loop for payment traffic
//!
//! This crate provides the "pilot" of the payops system - the runtime that
//! watches a payment network, diagnoses degradations, and applies guarded
//! remediations:
//! - Pulls metric windows from a [`runtime::SnapshotSource`]
//! - Sources root-cause hypotheses (`hypothesis`), model-backed or heuristic
//! - Scores and guards decisions through the deterministic core
//! - Applies remediations via an `ActionBackend` and watches for regressions
//!
//! # Architecture
//!
//! The agent follows a constrained loop, one cycle per metrics window:
//! 1. **Observe** - pull the next snapshot from the source
//! 2. **Resolve** - drain operator approvals, check rollback monitors
//! 3. **Hypothesize** (`hypothesis`) - model proposes, heuristic guarantees
//! 4. **Decide + Execute** - core engine scores, executor applies or holds
//! 5. **Learn + Publish** - grade outcomes, recompute mode, publish state
//!
//! # Key Types
//!
//! - `AgentRuntime` - Main orchestrator (see `runtime` module)
//! - `HypothesisProvider` - Pluggable model backend with heuristic fallback
//! - `SimulatedNetwork` / `SimulatedGateway` - Deterministic traffic and
//!   control plane for scenario replay (see `sim` module)
//!
//! # Safety Principle
//!
//! The model is strictly an analyst. It NEVER executes actions or scores
//! risk. Those are deterministic decisions made by the payops core, and
//! every side effect passes the same guardrails regardless of who proposed
//! the hypothesis.

pub mod hypothesis;
pub mod runtime;
pub mod sim;
