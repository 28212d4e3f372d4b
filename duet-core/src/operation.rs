use crate::amount::Amount;
use crate::approvals::Expiration;
use crate::error::StoreError;
use crate::id::{AccountId, ItemId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Operation hash type (32-byte array)
pub type OpHash = [u8; 32];

/// A mutating request against the ledger: who is acting, and what they ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// The account performing the operation
    pub sender: AccountId,

    /// What the sender asks the ledger to do
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(sender: AccountId, kind: OperationKind) -> Self {
        Self { sender, kind }
    }
}

/// The closed set of mutations the ledger accepts.
///
/// Every variant is applied atomically: it either fully commits or leaves no
/// observable change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Move fungible balance from the sender to `recipient`, reconciling
    /// items on both sides
    TransferFungible { recipient: AccountId, amount: Amount },

    /// Move fungible balance from `owner` to `recipient`, spending the
    /// sender's allowance
    TransferFungibleFrom {
        owner: AccountId,
        recipient: AccountId,
        amount: Amount,
    },

    /// Move one item (and one whole unit of balance) from its owner to
    /// `recipient`; no threshold arithmetic
    TransferItem { recipient: AccountId, item_id: ItemId },

    /// Grant `spender` the right to transfer a single item
    ApproveItem {
        item_id: ItemId,
        spender: AccountId,
        expires: Expiration,
    },

    /// Clear the approval on a single item
    RevokeItem { item_id: ItemId },

    /// Grant `operator` blanket authority over all the sender's items,
    /// present and future
    ApproveOperator {
        operator: AccountId,
        expires: Expiration,
    },

    /// Withdraw an operator's blanket authority
    RevokeOperator { operator: AccountId },

    /// Set the fungible allowance for `spender`; zero clears it
    ApproveFungible {
        spender: AccountId,
        amount: Amount,
        expires: Expiration,
    },

    /// Add or remove an account from the whitelist (admin only)
    SetWhitelist { account: AccountId, whitelisted: bool },

    /// Lock or unlock an item (owner only)
    SetLock { item_id: ItemId, locked: bool },

    /// Create new fungible supply for `recipient` (admin only)
    MintFungible { recipient: AccountId, amount: Amount },

    /// Destroy part of the sender's own fungible balance
    BurnFungible { amount: Amount },
}

impl OperationKind {
    /// Short action label, used in logs and receipts
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::TransferFungible { .. } => "transfer",
            OperationKind::TransferFungibleFrom { .. } => "transfer_from",
            OperationKind::TransferItem { .. } => "transfer_item",
            OperationKind::ApproveItem { .. } => "approve_item",
            OperationKind::RevokeItem { .. } => "revoke_item",
            OperationKind::ApproveOperator { .. } => "approve_operator",
            OperationKind::RevokeOperator { .. } => "revoke_operator",
            OperationKind::ApproveFungible { .. } => "approve_fungible",
            OperationKind::SetWhitelist { .. } => "set_whitelist",
            OperationKind::SetLock { .. } => "set_lock",
            OperationKind::MintFungible { .. } => "mint",
            OperationKind::BurnFungible { .. } => "burn",
        }
    }
}

/// Hash an operation together with its sequence number.
///
/// The sequence number makes two submissions of the same payload
/// distinguishable in the receipt store.
pub fn hash_operation(sequence: u64, operation: &Operation) -> Result<OpHash, StoreError> {
    let encoded = bincode::serialize(operation)?;

    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"DUET_OPERATION");
    hasher.update(sequence.to_le_bytes());
    hasher.update(&encoded);

    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_op() -> Operation {
        Operation::new(
            AccountId::new("alice"),
            OperationKind::TransferFungible {
                recipient: AccountId::new("bob"),
                amount: Amount::new(500),
            },
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let op = transfer_op();
        let h1 = hash_operation(1, &op).unwrap();
        let h2 = hash_operation(1, &op).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_depends_on_sequence() {
        let op = transfer_op();
        let h1 = hash_operation(1, &op).unwrap();
        let h2 = hash_operation(2, &op).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hash_depends_on_payload() {
        let op1 = transfer_op();
        let op2 = Operation::new(
            AccountId::new("alice"),
            OperationKind::TransferFungible {
                recipient: AccountId::new("bob"),
                amount: Amount::new(501),
            },
        );
        assert_ne!(
            hash_operation(1, &op1).unwrap(),
            hash_operation(1, &op2).unwrap()
        );
    }

    #[test]
    fn test_action_names() {
        assert_eq!(transfer_op().kind.name(), "transfer");
        assert_eq!(
            OperationKind::SetLock {
                item_id: ItemId::new(1),
                locked: true
            }
            .name(),
            "set_lock"
        );
    }
}
