use duet_core::{AccountId, LedgerReceipt, OpHash, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Iterator over receipts coming out of a [`ReceiptStore`]
pub trait ReceiptIterator: Iterator<Item = Result<LedgerReceipt, StoreError>> {}

/// Storage interface for operation receipts.
///
/// Receipts are immutable once stored; the store only ever gains entries.
pub trait ReceiptStore {
    /// Store a receipt, indexing it by operation hash, by sequence number,
    /// and by every account its events touched.
    ///
    /// # Parameters
    /// * `receipt` - The receipt to store
    ///
    /// # Returns
    /// `Ok(())` on success, or an error if the receipt could not be stored
    fn store_receipt(&self, receipt: &LedgerReceipt) -> Result<(), StoreError>;

    /// Look up the receipt for an operation hash.
    ///
    /// # Parameters
    /// * `hash` - Hash of the operation the receipt was issued for
    ///
    /// # Returns
    /// The receipt, or `None` if no operation with that hash was executed
    fn get_receipt(&self, hash: &OpHash) -> Result<Option<LedgerReceipt>, StoreError>;

    /// Look up a receipt by its execution sequence number.
    ///
    /// # Parameters
    /// * `sequence` - Position of the operation in execution order
    ///
    /// # Returns
    /// The receipt, or `None` if no operation ran at that sequence
    fn get_receipt_by_sequence(
        &self,
        sequence: u64,
    ) -> Result<Option<LedgerReceipt>, StoreError>;

    /// All receipts whose events touched the given account, in execution
    /// order.
    ///
    /// # Parameters
    /// * `account` - The account to look up
    ///
    /// # Returns
    /// An iterator over the matching receipts
    fn receipts_for_account(&self, account: &AccountId) -> Box<dyn ReceiptIterator + '_>;
}

/// In-memory implementation of [`ReceiptStore`]
#[derive(Debug, Default, Clone)]
pub struct InMemoryReceiptStore {
    /// Receipts indexed by operation hash
    receipts: Arc<Mutex<HashMap<OpHash, LedgerReceipt>>>,

    /// Operation hashes indexed by touched account
    account_index: Arc<Mutex<HashMap<AccountId, HashSet<OpHash>>>>,

    /// Operation hashes indexed by sequence number
    sequence_index: Arc<Mutex<HashMap<u64, OpHash>>>,
}

impl InMemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of receipts held
    pub fn len(&self) -> usize {
        self.receipts.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReceiptStore for InMemoryReceiptStore {
    fn store_receipt(&self, receipt: &LedgerReceipt) -> Result<(), StoreError> {
        let hash = receipt.operation_hash;

        {
            let mut receipts = self
                .receipts
                .lock()
                .map_err(|e| StoreError::Other(format!("Failed to acquire lock: {}", e)))?;
            receipts.insert(hash, receipt.clone());
        }

        {
            let mut index = self
                .account_index
                .lock()
                .map_err(|e| StoreError::Other(format!("Failed to acquire lock: {}", e)))?;
            for account in receipt.accounts() {
                index.entry(account).or_default().insert(hash);
            }
        }

        let mut by_sequence = self
            .sequence_index
            .lock()
            .map_err(|e| StoreError::Other(format!("Failed to acquire lock: {}", e)))?;
        by_sequence.insert(receipt.sequence, hash);
        Ok(())
    }

    fn get_receipt(&self, hash: &OpHash) -> Result<Option<LedgerReceipt>, StoreError> {
        let receipts = self
            .receipts
            .lock()
            .map_err(|e| StoreError::Other(format!("Failed to acquire lock: {}", e)))?;
        Ok(receipts.get(hash).cloned())
    }

    fn get_receipt_by_sequence(
        &self,
        sequence: u64,
    ) -> Result<Option<LedgerReceipt>, StoreError> {
        let hash = {
            let by_sequence = self
                .sequence_index
                .lock()
                .map_err(|e| StoreError::Other(format!("Failed to acquire lock: {}", e)))?;
            match by_sequence.get(&sequence) {
                Some(hash) => *hash,
                None => return Ok(None),
            }
        };
        self.get_receipt(&hash)
    }

    fn receipts_for_account(&self, account: &AccountId) -> Box<dyn ReceiptIterator + '_> {
        let hashes = match self.account_index.lock() {
            Ok(index) => index.get(account).cloned().unwrap_or_default(),
            Err(_) => HashSet::new(),
        };
        let mut matched = match self.receipts.lock() {
            Ok(receipts) => hashes
                .iter()
                .filter_map(|hash| receipts.get(hash).cloned())
                .collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        matched.sort_by_key(|receipt| receipt.sequence);
        Box::new(InMemoryReceiptIterator {
            receipts: matched,
            current_index: 0,
        })
    }
}

/// Iterator over a snapshot of matching receipts
pub struct InMemoryReceiptIterator {
    receipts: Vec<LedgerReceipt>,
    current_index: usize,
}

impl Iterator for InMemoryReceiptIterator {
    type Item = Result<LedgerReceipt, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index < self.receipts.len() {
            let receipt = self.receipts[self.current_index].clone();
            self.current_index += 1;
            Some(Ok(receipt))
        } else {
            None
        }
    }
}

impl ReceiptIterator for InMemoryReceiptIterator {}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_core::{Amount, LedgerEvent};

    fn account(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn transfer_receipt(sequence: u64, from: &str, to: &str) -> LedgerReceipt {
        LedgerReceipt::success(
            [sequence as u8; 32],
            sequence,
            1_700_000_000 + sequence,
            vec![LedgerEvent::FungibleTransferred {
                from: account(from),
                to: account(to),
                amount: Amount::new(100),
            }],
        )
    }

    #[test]
    fn test_store_and_get_by_hash() {
        let store = InMemoryReceiptStore::new();
        let receipt = transfer_receipt(1, "alice", "bob");
        store.store_receipt(&receipt).unwrap();

        let fetched = store.get_receipt(&receipt.operation_hash).unwrap();
        assert_eq!(fetched, Some(receipt));
        assert_eq!(store.get_receipt(&[9u8; 32]).unwrap(), None);
    }

    #[test]
    fn test_get_by_sequence() {
        let store = InMemoryReceiptStore::new();
        store.store_receipt(&transfer_receipt(1, "alice", "bob")).unwrap();
        store.store_receipt(&transfer_receipt(2, "bob", "carol")).unwrap();

        let second = store.get_receipt_by_sequence(2).unwrap().unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(store.get_receipt_by_sequence(3).unwrap(), None);
    }

    #[test]
    fn test_receipts_for_account_in_execution_order() {
        let store = InMemoryReceiptStore::new();
        store.store_receipt(&transfer_receipt(2, "bob", "carol")).unwrap();
        store.store_receipt(&transfer_receipt(1, "alice", "bob")).unwrap();
        store.store_receipt(&transfer_receipt(3, "alice", "dave")).unwrap();

        let bob: Vec<u64> = store
            .receipts_for_account(&account("bob"))
            .map(|r| r.unwrap().sequence)
            .collect();
        assert_eq!(bob, vec![1, 2]);

        assert_eq!(store.receipts_for_account(&account("erin")).count(), 0);
        assert_eq!(store.len(), 3);
    }
}
