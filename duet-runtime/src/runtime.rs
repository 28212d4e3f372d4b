use crate::receipt_store::{InMemoryReceiptStore, ReceiptStore};
use chrono::Utc;
use duet_core::{
    hash_operation, AccountId, Allowance, Amount, ItemApproval, ItemId, LedgerConfig, LedgerError,
    LedgerReceipt, OpHash, Operation,
};
use duet_ledger::Ledger;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Read-only questions the runtime answers without touching state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// The owner of an item and its approval, if any
    OwnerOf {
        item_id: ItemId,
        include_expired: bool,
    },
    /// Items held by one account, in ascending identifier order
    ItemsOf {
        owner: AccountId,
        start_after: Option<ItemId>,
        limit: Option<u32>,
    },
    /// All live items, in ascending identifier order
    AllItems {
        start_after: Option<ItemId>,
        limit: Option<u32>,
    },
    /// Number of live items
    TotalSupply,
    /// Fungible balance of one account
    BalanceOf { account: AccountId },
    /// Stored allowance between an owner and a spender
    AllowanceOf {
        owner: AccountId,
        spender: AccountId,
    },
    /// Whether an item is currently locked
    IsLocked { item_id: ItemId },
    /// Whether an account is exempt from threshold mints and burns
    IsWhitelisted { account: AccountId },
    /// Balance and held items of one account
    AccountInfo { account: AccountId },
    /// The admin account
    Admin,
}

/// Answers to [`Query`], one variant per response shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResult {
    Owner {
        owner: AccountId,
        approvals: Vec<ItemApproval>,
    },
    Items {
        ids: Vec<ItemId>,
    },
    TotalSupply {
        count: u64,
    },
    Balance {
        amount: Amount,
    },
    Allowance {
        allowance: Option<Allowance>,
    },
    Locked {
        locked: bool,
    },
    Whitelisted {
        whitelisted: bool,
    },
    AccountInfo {
        balance: Amount,
        items: Vec<ItemId>,
    },
    Admin {
        admin: AccountId,
    },
}

/// Drives a [`Ledger`] through a sequence of operations.
///
/// The runtime assigns each operation a sequence number and a timestamp,
/// executes it, and issues a [`LedgerReceipt`] that records the outcome.
/// Receipts are terminal: a failed operation gets a failure receipt and the
/// state is untouched, it is never retried. All receipts land in the
/// attached [`InMemoryReceiptStore`].
pub struct LedgerRuntime {
    ledger: Ledger,
    receipts: InMemoryReceiptStore,
    next_sequence: u64,
    clock_override: Option<u64>,
}

impl LedgerRuntime {
    /// A runtime over a fresh ledger
    pub fn new(config: LedgerConfig, admin: AccountId) -> Result<Self, LedgerError> {
        Ok(Self::resume(Ledger::new(config, admin)?, 1))
    }

    /// A runtime over an existing ledger, e.g. one loaded from a snapshot.
    /// `next_sequence` continues the numbering of earlier receipts.
    pub fn resume(ledger: Ledger, next_sequence: u64) -> Self {
        Self {
            ledger,
            receipts: InMemoryReceiptStore::new(),
            next_sequence,
            clock_override: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn receipt_store(&self) -> &InMemoryReceiptStore {
        &self.receipts
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Pin the logical clock, mainly for tests and deterministic replay
    pub fn set_time(&mut self, now: u64) {
        self.clock_override = Some(now);
    }

    /// Return to wall-clock time
    pub fn clear_time_override(&mut self) {
        self.clock_override = None;
    }

    /// The timestamp operations executed right now would carry
    pub fn now(&self) -> u64 {
        match self.clock_override {
            Some(now) => now,
            None => Utc::now().timestamp().max(0) as u64,
        }
    }

    /// Execute one operation and issue its receipt.
    ///
    /// The receipt is stored before it is returned; a storage failure is
    /// logged but does not undo the executed operation.
    pub fn execute(&mut self, operation: &Operation) -> LedgerReceipt {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let timestamp = self.now();

        let hash = match hash_operation(sequence, operation) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Failed to hash operation {}: {}", sequence, e);
                let receipt = LedgerReceipt::failure(
                    [0u8; 32],
                    sequence,
                    timestamp,
                    format!("failed to encode operation: {}", e),
                );
                self.store(&receipt);
                return receipt;
            }
        };

        let receipt = match self.ledger.apply(operation, timestamp) {
            Ok(events) => {
                debug!(
                    "Operation {} ({}) committed with {} events",
                    short_hash(&hash),
                    operation.kind.name(),
                    events.len()
                );
                LedgerReceipt::success(hash, sequence, timestamp, events)
            }
            Err(err) => {
                debug!(
                    "Operation {} ({}) failed: {}",
                    short_hash(&hash),
                    operation.kind.name(),
                    err
                );
                LedgerReceipt::failure(hash, sequence, timestamp, err.to_string())
            }
        };
        self.store(&receipt);
        receipt
    }

    fn store(&self, receipt: &LedgerReceipt) {
        if let Err(e) = self.receipts.store_receipt(receipt) {
            warn!(
                "Failed to store receipt for operation {}: {}",
                receipt.sequence, e
            );
        }
    }

    /// Answer a read-only query against the current state
    pub fn query(&self, query: &Query) -> Result<QueryResult, LedgerError> {
        let now = self.now();
        match query {
            Query::OwnerOf {
                item_id,
                include_expired,
            } => {
                let (owner, approvals) = self.ledger.owner_of(*item_id, *include_expired, now)?;
                Ok(QueryResult::Owner { owner, approvals })
            }
            Query::ItemsOf {
                owner,
                start_after,
                limit,
            } => Ok(QueryResult::Items {
                ids: self.ledger.items_of(owner, *start_after, *limit),
            }),
            Query::AllItems { start_after, limit } => Ok(QueryResult::Items {
                ids: self.ledger.all_items(*start_after, *limit),
            }),
            Query::TotalSupply => Ok(QueryResult::TotalSupply {
                count: self.ledger.total_supply(),
            }),
            Query::BalanceOf { account } => Ok(QueryResult::Balance {
                amount: self.ledger.balance_of(account),
            }),
            Query::AllowanceOf { owner, spender } => Ok(QueryResult::Allowance {
                allowance: self.ledger.allowance_of(owner, spender),
            }),
            Query::IsLocked { item_id } => Ok(QueryResult::Locked {
                locked: self.ledger.is_locked(*item_id)?,
            }),
            Query::IsWhitelisted { account } => Ok(QueryResult::Whitelisted {
                whitelisted: self.ledger.is_whitelisted(account),
            }),
            Query::AccountInfo { account } => {
                let (balance, items) = self.ledger.account_info(account);
                Ok(QueryResult::AccountInfo { balance, items })
            }
            Query::Admin => Ok(QueryResult::Admin {
                admin: self.ledger.admin().clone(),
            }),
        }
    }
}

fn short_hash(hash: &OpHash) -> String {
    hex::encode(&hash[..6])
}
