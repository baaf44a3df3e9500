//! Call Dispatch & Concurrency Engine.
//!
//! Owns the Active-Call Ledger, the Concurrency Gate, the Bot Warmup
//! Client, the lazy/periodic Timeout Sweeper, and the Call Pipeline that
//! strings them together. Dispatches through the [`router_port::CallRouter`]
//! trait so this crate never depends on a specific telephony provider.

pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod pipeline;
pub mod router_port;
pub mod sweeper;
pub mod warmup;

pub use config::DispatchConfig;
pub use error::DispatchError;
pub use gate::{ConcurrencyGate, GateCheck, WaitOutcome};
pub use ledger::{ActiveCallLedger, InsertOutcome, TransitionFields};
pub use pipeline::{CallPipeline, PipelineInput, PipelineOutcome};
pub use router_port::{CallRouter, DispatchCallParams, RouterFailure, RouterFailureKind, RouterSuccess};
pub use sweeper::TimeoutSweeper;
pub use warmup::{BotWarmupClient, WarmupOutcome};
