use crate::amount::Amount;
use crate::id::{AccountId, ItemId};
use std::io;
use thiserror::Error;

/// Every way a ledger operation can fail.
///
/// A failed operation leaves no observable state change: all mutations made
/// earlier in the same operation are rolled back before the error is
/// returned. The ledger never retries internally; callers own retry policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A debit exceeds the account's balance
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    /// A spend on behalf of another account exceeds the granted allowance
    #[error("allowance exceeded: required {required}, available {available}")]
    AllowanceExceeded { required: Amount, available: Amount },

    /// An approval or allowance exists but is past its expiration
    #[error("approval has expired")]
    Expired,

    /// The sender must own the item for this action
    #[error("sender is not the owner of item {id}")]
    NotOwner { id: ItemId },

    /// The sender holds neither an item approval nor an operator approval
    #[error("sender is not approved to transfer item {id}")]
    NotApproved { id: ItemId },

    /// The item does not exist or has been burned
    #[error("unknown item {id}")]
    UnknownItem { id: ItemId },

    /// A threshold-crossing burn reached a locked item at the top of the
    /// owner's stack; the whole operation is vetoed
    #[error("item {id} is locked and vetoes the burn")]
    LockedItemBurn { id: ItemId },

    /// Minting would push the live item count past the configured maximum
    #[error("mint would exceed the maximum supply of {max}")]
    SupplyExceeded { max: u64 },

    /// Discrete items cannot be transferred to a whitelisted account
    #[error("recipient {account} is whitelisted and cannot receive items")]
    WhitelistedRecipient { account: AccountId },

    /// Arithmetic overflow on a balance or allowance
    #[error("amount overflow")]
    AmountOverflow,

    /// The sender is not allowed to perform this administrative action
    #[error("unauthorized")]
    Unauthorized,

    /// The ledger configuration is invalid
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Errors from the persistence boundary (snapshots, receipt log, receipt
/// storage). Kept separate from [`LedgerError`]: a storage failure says
/// nothing about the validity of an operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO errors that occur when reading/writing files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors related to missing or invalid data
    #[error("Not found: {0}")]
    NotFound(String),

    /// Errors that occur during snapshot operations
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Errors that occur during receipt log operations
    #[error("Receipt log error: {0}")]
    Log(String),

    /// Generic errors that don't fit in other categories
    #[error("Other error: {0}")]
    Other(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

// Additional From conversions for common error types

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<String> for StoreError {
    fn from(err: String) -> Self {
        StoreError::Other(err)
    }
}

impl From<&str> for StoreError {
    fn from(err: &str) -> Self {
        StoreError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::InsufficientBalance {
            required: Amount::new(100),
            available: Amount::new(40),
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance: required 100, available 40"
        );

        let err = LedgerError::LockedItemBurn { id: ItemId::new(7) };
        assert_eq!(err.to_string(), "item 7 is locked and vetoes the burn");
    }

    #[test]
    fn test_store_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = StoreError::from(io_err);
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn test_store_error_from_string() {
        let err: StoreError = "something odd".into();
        assert!(matches!(err, StoreError::Other(_)));
    }
}
