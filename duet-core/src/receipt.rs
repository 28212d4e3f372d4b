use crate::amount::Amount;
use crate::id::{AccountId, ItemId};
use crate::operation::OpHash;
use serde::{Deserialize, Serialize};

/// A state change recorded by a committed operation.
///
/// One operation can produce several events: a fungible transfer that crosses
/// unit boundaries also reports every item it minted or burned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Fungible balance moved between accounts
    FungibleTransferred {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },

    /// New fungible supply was created
    FungibleMinted { to: AccountId, amount: Amount },

    /// Fungible supply was destroyed
    FungibleBurned { from: AccountId, amount: Amount },

    /// A threshold crossing minted an item
    ItemMinted { owner: AccountId, id: ItemId },

    /// A threshold crossing burned an item
    ItemBurned { owner: AccountId, id: ItemId },

    /// An item changed hands directly
    ItemTransferred {
        from: AccountId,
        to: AccountId,
        id: ItemId,
    },

    /// A single-item transfer approval was granted
    ItemApproved {
        owner: AccountId,
        spender: AccountId,
        id: ItemId,
    },

    /// A single-item transfer approval was cleared explicitly
    ItemApprovalRevoked { owner: AccountId, id: ItemId },

    /// Blanket operator authority was granted
    OperatorApproved {
        owner: AccountId,
        operator: AccountId,
    },

    /// Blanket operator authority was withdrawn
    OperatorRevoked {
        owner: AccountId,
        operator: AccountId,
    },

    /// A fungible allowance was set or cleared
    AllowanceSet {
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    },

    /// An account's whitelist flag changed
    WhitelistSet {
        account: AccountId,
        whitelisted: bool,
    },

    /// An item's lock flag changed
    LockSet { id: ItemId, locked: bool },
}

impl LedgerEvent {
    /// Accounts mentioned by this event, used to index receipts per account
    pub fn accounts(&self) -> Vec<&AccountId> {
        match self {
            LedgerEvent::FungibleTransferred { from, to, .. } => vec![from, to],
            LedgerEvent::FungibleMinted { to, .. } => vec![to],
            LedgerEvent::FungibleBurned { from, .. } => vec![from],
            LedgerEvent::ItemMinted { owner, .. } => vec![owner],
            LedgerEvent::ItemBurned { owner, .. } => vec![owner],
            LedgerEvent::ItemTransferred { from, to, .. } => vec![from, to],
            LedgerEvent::ItemApproved { owner, spender, .. } => vec![owner, spender],
            LedgerEvent::ItemApprovalRevoked { owner, .. } => vec![owner],
            LedgerEvent::OperatorApproved { owner, operator } => vec![owner, operator],
            LedgerEvent::OperatorRevoked { owner, operator } => vec![owner, operator],
            LedgerEvent::AllowanceSet { owner, spender, .. } => vec![owner, spender],
            LedgerEvent::WhitelistSet { account, .. } => vec![account],
            LedgerEvent::LockSet { .. } => vec![],
        }
    }
}

/// The outcome of one executed operation.
///
/// Receipts are terminal when created: an operation either fully committed
/// (`success` with its events) or fully aborted (`success == false` with an
/// error message and no events). There is no in-flight state to roll back
/// later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Hash of the executed operation
    pub operation_hash: OpHash,

    /// Position of the operation in the execution order
    pub sequence: u64,

    /// Whether the operation committed
    pub success: bool,

    /// Timestamp when the operation was processed (unix seconds)
    pub timestamp: u64,

    /// The error message if the operation aborted
    pub error_message: Option<String>,

    /// State changes made by the operation, in application order
    pub events: Vec<LedgerEvent>,
}

impl LedgerReceipt {
    /// Create a receipt for a committed operation
    pub fn success(
        operation_hash: OpHash,
        sequence: u64,
        timestamp: u64,
        events: Vec<LedgerEvent>,
    ) -> Self {
        Self {
            operation_hash,
            sequence,
            success: true,
            timestamp,
            error_message: None,
            events,
        }
    }

    /// Create a receipt for an aborted operation
    pub fn failure(
        operation_hash: OpHash,
        sequence: u64,
        timestamp: u64,
        error_message: String,
    ) -> Self {
        Self {
            operation_hash,
            sequence,
            success: false,
            timestamp,
            error_message: Some(error_message),
            events: Vec::new(),
        }
    }

    /// Number of state changes the operation made
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Deduplicated accounts touched by this receipt's events
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut seen = Vec::new();
        for event in &self.events {
            for account in event.accounts() {
                if !seen.contains(account) {
                    seen.push(account.clone());
                }
            }
        }
        seen
    }
}
