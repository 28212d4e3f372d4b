//! Umbrella crate for the duet ledger.
//!
//! duet tracks one asset through two views at once: a divisible balance in
//! sub-units and a registry of discrete, individually ownable items. Every
//! time a balance crosses a whole-unit boundary the ledger mints or burns
//! items so the two views stay consistent, unless the account is whitelisted
//! out of the mechanism.
//!
//! This crate re-exports the whole workspace:
//! - `duet-core`: identifiers, amounts, operations, receipts, errors
//! - `duet-ledger`: the state machine and its snapshot/log persistence
//! - `duet-runtime`: operation execution, receipt indexing, queries
//!
//! ```
//! use duet::{AccountId, Amount, LedgerConfig, LedgerRuntime, Operation, OperationKind};
//!
//! let config = LedgerConfig::new(Amount::new(1_000)).unwrap();
//! let admin = AccountId::new("admin");
//! let mut runtime = LedgerRuntime::new(config, admin.clone()).unwrap();
//!
//! let receipt = runtime.execute(&Operation::new(
//!     admin,
//!     OperationKind::MintFungible {
//!         recipient: AccountId::new("alice"),
//!         amount: Amount::new(2_500),
//!     },
//! ));
//! assert!(receipt.success);
//!
//! // 2500 sub-units is two whole units, so alice also holds two items
//! assert_eq!(runtime.ledger().total_supply(), 2);
//! ```

pub use duet_core::*;
pub use duet_ledger::*;
pub use duet_runtime::*;
