use crate::ownership::OwnedStack;
use duet_core::{AccountId, Allowance, Amount, Expiration, ItemApproval, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A live item in the registry.
///
/// The `owner` field is authoritative; the per-account [`OwnedStack`] is a
/// derived index kept in lockstep. Burning removes the record entirely, and
/// the identifier is never allocated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// The account that owns the item
    pub owner: AccountId,

    /// While set, the item vetoes threshold burns
    pub locked: bool,
}

impl ItemRecord {
    /// A fresh, unlocked record for the given owner
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            locked: false,
        }
    }
}

/// A mutation recorded for rollback. Each variant carries what is needed to
/// put the touched entry back exactly as it was.
#[derive(Debug, Clone)]
enum UndoStep {
    BalanceWritten {
        account: AccountId,
        previous: Option<Amount>,
    },
    WhitelistWritten {
        account: AccountId,
        previous: bool,
    },
    ItemWritten {
        id: ItemId,
        previous: Option<ItemRecord>,
    },
    IdAllocated {
        previous: u64,
    },
    OwnedPushed {
        account: AccountId,
    },
    OwnedPopped {
        account: AccountId,
        id: ItemId,
    },
    OwnedRemoved {
        account: AccountId,
        index: usize,
        id: ItemId,
    },
    ItemApprovalWritten {
        id: ItemId,
        previous: Option<ItemApproval>,
    },
    OperatorWritten {
        owner: AccountId,
        operator: AccountId,
        previous: Option<Expiration>,
    },
    AllowanceWritten {
        owner: AccountId,
        spender: AccountId,
        previous: Option<Allowance>,
    },
}

/// Rollback journal for one operation.
///
/// Every table write pushes its inverse here; on failure the journal is
/// unwound in reverse, leaving the state exactly as it was before the
/// operation started. On success it is simply dropped.
#[derive(Debug, Default)]
pub struct Journal {
    steps: Vec<UndoStep>,
}

impl Journal {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn record(&mut self, step: UndoStep) {
        self.steps.push(step);
    }

    /// Undo every recorded mutation, most recent first
    pub fn unwind(self, state: &mut LedgerState) {
        for step in self.steps.into_iter().rev() {
            state.undo(step);
        }
    }
}

/// The whole persisted state of a ledger instance: the balance table, the
/// whitelist, the item registry, the per-account ownership stacks, the three
/// approval tables, and the monotonic identifier counter.
///
/// All writes go through the journaled mutators so that any sequence of them
/// can be rolled back as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    /// The account allowed to mint supply and edit the whitelist
    admin: AccountId,

    /// Fungible balances in sub-units; zero balances are pruned
    balances: BTreeMap<AccountId, Amount>,

    /// Accounts exempt from automatic item mint and burn
    whitelist: BTreeSet<AccountId>,

    /// Live items by identifier; burned items are removed outright
    items: BTreeMap<ItemId, ItemRecord>,

    /// Derived per-account ownership index; empty stacks are pruned
    owned: BTreeMap<AccountId, OwnedStack>,

    /// Per-item transfer approvals, cleared on every ownership change
    item_approvals: BTreeMap<ItemId, ItemApproval>,

    /// Blanket (owner, operator) approvals
    operator_approvals: BTreeMap<(AccountId, AccountId), Expiration>,

    /// Fungible (owner, spender) allowances
    allowances: BTreeMap<(AccountId, AccountId), Allowance>,

    /// Next identifier to allocate; starts at 1, never decremented by a
    /// committed operation
    next_item_id: u64,
}

impl LedgerState {
    pub fn new(admin: AccountId) -> Self {
        Self {
            admin,
            balances: BTreeMap::new(),
            whitelist: BTreeSet::new(),
            items: BTreeMap::new(),
            owned: BTreeMap::new(),
            item_approvals: BTreeMap::new(),
            operator_approvals: BTreeMap::new(),
            allowances: BTreeMap::new(),
            next_item_id: 1,
        }
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    /// An account's balance; absent entries read as zero
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances
            .get(account)
            .copied()
            .unwrap_or(Amount::zero())
    }

    pub fn is_whitelisted(&self, account: &AccountId) -> bool {
        self.whitelist.contains(account)
    }

    pub fn item(&self, id: ItemId) -> Option<&ItemRecord> {
        self.items.get(&id)
    }

    /// The live item registry, ordered by identifier
    pub fn items(&self) -> &BTreeMap<ItemId, ItemRecord> {
        &self.items
    }

    /// Count of live items
    pub fn live_item_count(&self) -> u64 {
        self.items.len() as u64
    }

    pub fn owned(&self, account: &AccountId) -> Option<&OwnedStack> {
        self.owned.get(account)
    }

    pub fn item_approval(&self, id: ItemId) -> Option<&ItemApproval> {
        self.item_approvals.get(&id)
    }

    pub fn operator_expiration(
        &self,
        owner: &AccountId,
        operator: &AccountId,
    ) -> Option<Expiration> {
        self.operator_approvals
            .get(&(owner.clone(), operator.clone()))
            .copied()
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Option<Allowance> {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
    }

    /// The identifier the next mint will receive
    pub fn next_item_id(&self) -> ItemId {
        ItemId::new(self.next_item_id)
    }

    /// Write an account's balance; zero removes the entry
    pub fn set_balance(&mut self, journal: &mut Journal, account: &AccountId, value: Amount) {
        let previous = self.balances.get(account).copied();
        journal.record(UndoStep::BalanceWritten {
            account: account.clone(),
            previous,
        });
        if value.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.clone(), value);
        }
    }

    pub fn set_whitelisted(
        &mut self,
        journal: &mut Journal,
        account: &AccountId,
        whitelisted: bool,
    ) {
        let previous = self.whitelist.contains(account);
        journal.record(UndoStep::WhitelistWritten {
            account: account.clone(),
            previous,
        });
        if whitelisted {
            self.whitelist.insert(account.clone());
        } else {
            self.whitelist.remove(account);
        }
    }

    /// Insert or replace an item record
    pub fn put_item(&mut self, journal: &mut Journal, id: ItemId, record: ItemRecord) {
        let previous = self.items.insert(id, record);
        journal.record(UndoStep::ItemWritten { id, previous });
    }

    /// Tombstone an item: the record is removed and the identifier retired
    pub fn remove_item(&mut self, journal: &mut Journal, id: ItemId) {
        let previous = self.items.remove(&id);
        journal.record(UndoStep::ItemWritten { id, previous });
    }

    /// Take the next identifier from the monotonic counter
    pub fn allocate_item_id(&mut self, journal: &mut Journal) -> ItemId {
        journal.record(UndoStep::IdAllocated {
            previous: self.next_item_id,
        });
        let id = ItemId::new(self.next_item_id);
        self.next_item_id += 1;
        id
    }

    /// Append an item to an account's ownership stack
    pub fn push_owned(&mut self, journal: &mut Journal, account: &AccountId, id: ItemId) {
        self.owned.entry(account.clone()).or_default().push(id);
        journal.record(UndoStep::OwnedPushed {
            account: account.clone(),
        });
    }

    /// Evict the most recently acquired item from an account's stack
    pub fn pop_owned(&mut self, journal: &mut Journal, account: &AccountId) -> Option<ItemId> {
        let stack = self.owned.get_mut(account)?;
        let id = stack.pop()?;
        if stack.is_empty() {
            self.owned.remove(account);
        }
        journal.record(UndoStep::OwnedPopped {
            account: account.clone(),
            id,
        });
        Some(id)
    }

    /// Remove a specific item from an account's stack, preserving the order
    /// of the rest. Returns false if the account does not hold the item.
    pub fn remove_owned(&mut self, journal: &mut Journal, account: &AccountId, id: ItemId) -> bool {
        let Some(stack) = self.owned.get_mut(account) else {
            return false;
        };
        let Some(index) = stack.remove(id) else {
            return false;
        };
        if stack.is_empty() {
            self.owned.remove(account);
        }
        journal.record(UndoStep::OwnedRemoved {
            account: account.clone(),
            index,
            id,
        });
        true
    }

    /// Set or clear the transfer approval on an item
    pub fn set_item_approval(
        &mut self,
        journal: &mut Journal,
        id: ItemId,
        approval: Option<ItemApproval>,
    ) {
        let previous = match approval {
            Some(approval) => self.item_approvals.insert(id, approval),
            None => self.item_approvals.remove(&id),
        };
        journal.record(UndoStep::ItemApprovalWritten { id, previous });
    }

    /// Set or clear a blanket operator approval
    pub fn set_operator(
        &mut self,
        journal: &mut Journal,
        owner: &AccountId,
        operator: &AccountId,
        expires: Option<Expiration>,
    ) {
        let key = (owner.clone(), operator.clone());
        let previous = match expires {
            Some(expires) => self.operator_approvals.insert(key, expires),
            None => self.operator_approvals.remove(&key),
        };
        journal.record(UndoStep::OperatorWritten {
            owner: owner.clone(),
            operator: operator.clone(),
            previous,
        });
    }

    /// Set or clear a fungible allowance
    pub fn set_allowance(
        &mut self,
        journal: &mut Journal,
        owner: &AccountId,
        spender: &AccountId,
        allowance: Option<Allowance>,
    ) {
        let key = (owner.clone(), spender.clone());
        let previous = match allowance {
            Some(allowance) => self.allowances.insert(key, allowance),
            None => self.allowances.remove(&key),
        };
        journal.record(UndoStep::AllowanceWritten {
            owner: owner.clone(),
            spender: spender.clone(),
            previous,
        });
    }

    fn undo(&mut self, step: UndoStep) {
        match step {
            UndoStep::BalanceWritten { account, previous } => match previous {
                Some(value) => {
                    self.balances.insert(account, value);
                }
                None => {
                    self.balances.remove(&account);
                }
            },
            UndoStep::WhitelistWritten { account, previous } => {
                if previous {
                    self.whitelist.insert(account);
                } else {
                    self.whitelist.remove(&account);
                }
            }
            UndoStep::ItemWritten { id, previous } => match previous {
                Some(record) => {
                    self.items.insert(id, record);
                }
                None => {
                    self.items.remove(&id);
                }
            },
            UndoStep::IdAllocated { previous } => {
                self.next_item_id = previous;
            }
            UndoStep::OwnedPushed { account } => {
                let emptied = match self.owned.get_mut(&account) {
                    Some(stack) => {
                        stack.pop();
                        stack.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    self.owned.remove(&account);
                }
            }
            UndoStep::OwnedPopped { account, id } => {
                self.owned.entry(account).or_default().push(id);
            }
            UndoStep::OwnedRemoved { account, index, id } => {
                self.owned.entry(account).or_default().insert(index, id);
            }
            UndoStep::ItemApprovalWritten { id, previous } => match previous {
                Some(approval) => {
                    self.item_approvals.insert(id, approval);
                }
                None => {
                    self.item_approvals.remove(&id);
                }
            },
            UndoStep::OperatorWritten {
                owner,
                operator,
                previous,
            } => {
                let key = (owner, operator);
                match previous {
                    Some(expires) => {
                        self.operator_approvals.insert(key, expires);
                    }
                    None => {
                        self.operator_approvals.remove(&key);
                    }
                }
            }
            UndoStep::AllowanceWritten {
                owner,
                spender,
                previous,
            } => {
                let key = (owner, spender);
                match previous {
                    Some(allowance) => {
                        self.allowances.insert(key, allowance);
                    }
                    None => {
                        self.allowances.remove(&key);
                    }
                }
            }
        }
    }

    /// Check the cross-structure invariants between the registry and the
    /// ownership index:
    /// - every stack entry names a live item whose `owner` is that account,
    ///   with no duplicates and no empty stacks;
    /// - every live item appears in its owner's stack;
    /// - approvals reference live items only;
    /// - no live identifier is at or past the allocation counter.
    pub fn is_consistent(&self) -> bool {
        let mut indexed = 0usize;
        for (account, stack) in &self.owned {
            if stack.is_empty() {
                return false;
            }
            let mut seen = BTreeSet::new();
            for id in stack.ids() {
                if !seen.insert(*id) {
                    return false;
                }
                match self.items.get(id) {
                    Some(record) if record.owner == *account => {}
                    _ => return false,
                }
            }
            indexed += stack.len();
        }
        if indexed != self.items.len() {
            return false;
        }
        for id in self.item_approvals.keys() {
            if !self.items.contains_key(id) {
                return false;
            }
        }
        for id in self.items.keys() {
            if id.value() >= self.next_item_id {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> AccountId {
        AccountId::new(name)
    }

    /// A state with one minted item owned by `owner`
    fn state_with_item(owner: &AccountId) -> (LedgerState, ItemId) {
        let mut state = LedgerState::new(account("admin"));
        let mut journal = Journal::new();
        let id = state.allocate_item_id(&mut journal);
        state.put_item(&mut journal, id, ItemRecord::new(owner.clone()));
        state.push_owned(&mut journal, owner, id);
        state.set_balance(&mut journal, owner, Amount::new(1000));
        (state, id)
    }

    #[test]
    fn test_unwind_restores_everything() {
        let alice = account("alice");
        let bob = account("bob");
        let (mut state, id) = state_with_item(&alice);
        let before = state.clone();

        let mut journal = Journal::new();
        state.set_balance(&mut journal, &alice, Amount::new(250));
        state.set_balance(&mut journal, &bob, Amount::new(750));
        state.set_whitelisted(&mut journal, &bob, true);
        state.set_item_approval(
            &mut journal,
            id,
            Some(ItemApproval::new(bob.clone(), Expiration::Never)),
        );
        state.set_operator(&mut journal, &alice, &bob, Some(Expiration::AtTime(99)));
        state.set_allowance(
            &mut journal,
            &alice,
            &bob,
            Some(Allowance::new(Amount::new(10), Expiration::Never)),
        );
        let popped = state.pop_owned(&mut journal, &alice);
        assert_eq!(popped, Some(id));
        state.remove_item(&mut journal, id);
        let minted = state.allocate_item_id(&mut journal);
        state.put_item(&mut journal, minted, ItemRecord::new(bob.clone()));
        state.push_owned(&mut journal, &bob, minted);

        assert_ne!(state, before);
        journal.unwind(&mut state);
        assert_eq!(state, before);
    }

    #[test]
    fn test_zero_balance_is_pruned() {
        let alice = account("alice");
        let mut touched = LedgerState::new(account("admin"));
        let mut journal = Journal::new();
        touched.set_balance(&mut journal, &alice, Amount::new(5));
        touched.set_balance(&mut journal, &alice, Amount::zero());

        // Writing and then zeroing a balance leaves the same state as never
        // writing it
        assert_eq!(touched, LedgerState::new(account("admin")));
    }

    #[test]
    fn test_remove_owned_preserves_order() {
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let mut journal = Journal::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = state.allocate_item_id(&mut journal);
            state.put_item(&mut journal, id, ItemRecord::new(alice.clone()));
            state.push_owned(&mut journal, &alice, id);
            ids.push(id);
        }

        assert!(state.remove_owned(&mut journal, &alice, ids[1]));
        let stack = state.owned(&alice).unwrap();
        assert_eq!(stack.ids(), &[ids[0], ids[2]]);
        assert_eq!(stack.top(), Some(ids[2]));

        assert!(!state.remove_owned(&mut journal, &alice, ids[1]));
    }

    #[test]
    fn test_allocation_is_monotonic() {
        let mut state = LedgerState::new(account("admin"));
        let mut journal = Journal::new();
        let first = state.allocate_item_id(&mut journal);
        let second = state.allocate_item_id(&mut journal);
        assert_eq!(first, ItemId::new(1));
        assert_eq!(second, ItemId::new(2));
        assert_eq!(state.next_item_id(), ItemId::new(3));
    }

    #[test]
    fn test_consistency_detects_orphan_item() {
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let mut journal = Journal::new();
        let id = state.allocate_item_id(&mut journal);
        // Registry entry without an index entry
        state.put_item(&mut journal, id, ItemRecord::new(alice.clone()));
        assert!(!state.is_consistent());

        state.push_owned(&mut journal, &alice, id);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_consistency_detects_dangling_approval() {
        let alice = account("alice");
        let (mut state, id) = state_with_item(&alice);
        let mut journal = Journal::new();
        state.set_item_approval(
            &mut journal,
            id,
            Some(ItemApproval::new(account("bob"), Expiration::Never)),
        );
        assert!(state.is_consistent());

        state.pop_owned(&mut journal, &alice);
        state.remove_item(&mut journal, id);
        // The approval now points at a tombstoned item
        assert!(!state.is_consistent());
    }
}
