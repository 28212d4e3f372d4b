//! The duet ledger state machine: balances, items, approvals, and the
//! threshold engine that keeps the two asset views consistent, plus the
//! snapshot and receipt-log persistence that goes with them.

pub mod ledger;
pub mod ownership;
pub mod state;
pub mod store;
mod threshold;

// Re-export the main types for convenience
pub use ledger::Ledger;
pub use ownership::OwnedStack;
pub use state::{ItemRecord, Journal, LedgerState};
pub use store::{FileReceiptLog, FileSnapshotStore, SnapshotStore};
