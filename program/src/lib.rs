//! Quorum vault: multi-party authorization of value transfers.
//!
//! A fixed set of approvers controls a vault. Any approver may propose an
//! action (target, value, payload); once `threshold` approvers have approved
//! it, any approver may execute it exactly once.
//!
//! [`ledger::AuthorizationLedger`] holds the rules in plain Rust and can be
//! used directly (or shared across threads through [`shared::SharedLedger`]).
//! [`processor::Processor`] applies the same rules to on-chain accounts.

pub mod error;
pub mod events;
pub mod executor;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod shared;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

pub use error::LedgerError;
pub use events::{EventKind, EventLog, EventSink, LedgerEvent, ProgramLog};
pub use executor::{ActionExecutor, VaultExecutor};
pub use ledger::AuthorizationLedger;
pub use shared::SharedLedger;
pub use state::{Action, LedgerSnapshot, Quorum};
