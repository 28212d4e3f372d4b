use crate::amount::Amount;
use crate::id::AccountId;
use serde::{Deserialize, Serialize};

/// When a grant stops being valid.
///
/// Time is a unix timestamp in seconds, supplied by the executor's clock; an
/// expired grant is treated as absent wherever authority is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiration {
    /// The grant never expires
    Never,
    /// The grant expires at the given unix timestamp (seconds)
    AtTime(u64),
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl Expiration {
    /// Check whether the grant has expired at `now`
    pub fn is_expired(&self, now: u64) -> bool {
        match self {
            Expiration::Never => false,
            Expiration::AtTime(at) => now >= *at,
        }
    }
}

/// A fungible spend allowance granted by an owner to a spender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    /// Remaining amount the spender may move on the owner's behalf.
    /// [`Amount::MAX`] means unlimited and is never debited.
    pub amount: Amount,

    /// Optional expiration of the grant
    pub expires: Expiration,
}

impl Allowance {
    pub fn new(amount: Amount, expires: Expiration) -> Self {
        Self { amount, expires }
    }
}

/// A transfer approval on a single item.
///
/// Cleared on every ownership change of the item, including burns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemApproval {
    /// The account allowed to transfer the item
    pub spender: AccountId,

    /// Optional expiration of the grant
    pub expires: Expiration,
}

impl ItemApproval {
    pub fn new(spender: AccountId, expires: Expiration) -> Self {
        Self { spender, expires }
    }

    /// Check whether the approval has expired at `now`
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_expires() {
        assert!(!Expiration::Never.is_expired(0));
        assert!(!Expiration::Never.is_expired(u64::MAX));
    }

    #[test]
    fn test_at_time_boundary() {
        let exp = Expiration::AtTime(100);
        assert!(!exp.is_expired(99));
        // Expiration is inclusive at the deadline
        assert!(exp.is_expired(100));
        assert!(exp.is_expired(101));
    }

    #[test]
    fn test_item_approval_expiry() {
        let approval = ItemApproval::new(AccountId::new("bob"), Expiration::AtTime(50));
        assert!(!approval.is_expired(49));
        assert!(approval.is_expired(50));
    }
}
