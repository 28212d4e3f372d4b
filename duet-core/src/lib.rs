pub mod amount;
pub mod approvals;
pub mod config;
pub mod error;
pub mod id;
pub mod operation;
pub mod receipt;

// Re-export the main types for convenience
pub use amount::Amount;
pub use approvals::{Allowance, Expiration, ItemApproval};
pub use config::{LedgerConfig, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use error::{LedgerError, StoreError};
pub use id::{AccountId, ItemId};
pub use operation::{hash_operation, OpHash, Operation, OperationKind};
pub use receipt::{LedgerEvent, LedgerReceipt};
