use serde::{Deserialize, Serialize};
use std::fmt;

// AccountId is an opaque account identifier. The ledger never interprets it;
// it only needs equality, ordering and cheap cloning for use as a table key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        AccountId(id)
    }
}

/// Identifier of a discrete item.
///
/// Identifiers are allocated from a strictly increasing counter starting at 1
/// and are never reused, even after the item is burned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ItemId(u64);

impl ItemId {
    pub fn new(raw: u64) -> Self {
        ItemId(raw)
    }

    /// Get the raw numeric value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The identifier allocated immediately after this one
    pub fn next(&self) -> ItemId {
        ItemId(self.0 + 1)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_round_trip() {
        let id = AccountId::new("alice");
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
        assert_eq!(AccountId::from("alice"), id);
    }

    #[test]
    fn test_account_id_ordering() {
        let a = AccountId::new("a");
        let b = AccountId::new("b");
        assert!(a < b);
    }

    #[test]
    fn test_item_id_monotonic() {
        let first = ItemId::new(1);
        let second = first.next();
        assert_eq!(second.value(), 2);
        assert!(first < second);
    }

    #[test]
    fn test_item_id_display() {
        assert_eq!(ItemId::new(42).to_string(), "42");
    }
}
