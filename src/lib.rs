//! Arena Runner Library
//!
//! Autonomous trading session driver: polls a gym session service,
//! asks a language-model oracle for decisions, validates and clamps
//! them, dispatches actions and mirrors trades on-chain best-effort.

pub mod chain;
pub mod client;
pub mod config;
pub mod context;
pub mod decision;
pub mod dispatch;
pub mod ledger;
pub mod oracle;
pub mod runner;
pub mod session;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use chain::{ChainClient, SignerError, TransferRequest, TransferSigner, TxReceipt};
pub use client::{ClientError, GymClient, SessionService};
pub use config::{ChainControls, LlmControls, RunnerConfig, SessionSpec};
pub use decision::{validate, Decision, DecisionAction, DecisionError, ValidatedDecision};
pub use dispatch::Dispatcher;
pub use ledger::{MarketLedger, PollOutcome};
pub use oracle::{DecisionOracle, OracleClient, OracleError, OracleRequest};
pub use runner::{ArenaRunner, Outcome, StopToken};
pub use session::SessionManager;
pub use store::{MarketView, SessionStore};
pub use types::{
    ActionRequest, Candle, LogKind, LogLine, Mode, OnChainEntry, OnChainStatus, OpenOrder,
    Session, StateResponse, TradeRecord, Wallet,
};

#[cfg(test)]
mod tests;
