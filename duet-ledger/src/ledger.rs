use crate::state::{ItemRecord, Journal, LedgerState};
use crate::threshold;
use duet_core::{
    AccountId, Allowance, Amount, Expiration, ItemApproval, ItemId, LedgerConfig, LedgerError,
    LedgerEvent, Operation, OperationKind,
};
use std::ops::Bound;

/// The ledger state machine.
///
/// Wraps a [`LedgerState`] with the fixed [`LedgerConfig`] and exposes one
/// method per operation. Every operation is atomic: it either commits all of
/// its writes, including the item mints and burns triggered by whole-unit
/// threshold crossings, or it rolls back to the pre-operation state and
/// returns the error.
#[derive(Debug, Clone)]
pub struct Ledger {
    config: LedgerConfig,
    state: LedgerState,
}

impl Ledger {
    /// A fresh ledger with no balances and no items
    pub fn new(config: LedgerConfig, admin: AccountId) -> Result<Self, LedgerError> {
        Self::from_state(config, LedgerState::new(admin))
    }

    /// Resume from a previously captured state, e.g. a loaded snapshot
    pub fn from_state(config: LedgerConfig, state: LedgerState) -> Result<Self, LedgerError> {
        if config.unit.is_zero() {
            return Err(LedgerError::InvalidConfig {
                reason: "unit must be non-zero".to_string(),
            });
        }
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Run one operation body against the state. On error the journal is
    /// unwound before the error is returned, so the caller never observes a
    /// partial write.
    fn with_journal(
        &mut self,
        op: impl FnOnce(
            &LedgerConfig,
            &mut LedgerState,
            &mut Journal,
            &mut Vec<LedgerEvent>,
        ) -> Result<(), LedgerError>,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let mut journal = Journal::new();
        let mut events = Vec::new();
        match op(&self.config, &mut self.state, &mut journal, &mut events) {
            Ok(()) => {
                debug_assert!(self.state.is_consistent());
                Ok(events)
            }
            Err(err) => {
                journal.unwind(&mut self.state);
                debug_assert!(self.state.is_consistent());
                Err(err)
            }
        }
    }

    /// Apply a signed-off operation at logical time `now`, returning the
    /// events it produced
    pub fn apply(
        &mut self,
        operation: &Operation,
        now: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let sender = &operation.sender;
        match &operation.kind {
            OperationKind::TransferFungible { recipient, amount } => {
                self.transfer_fungible(sender, recipient, *amount)
            }
            OperationKind::TransferFungibleFrom {
                owner,
                recipient,
                amount,
            } => self.transfer_fungible_from(sender, owner, recipient, *amount, now),
            OperationKind::TransferItem { recipient, item_id } => {
                self.transfer_item(sender, recipient, *item_id, now)
            }
            OperationKind::ApproveItem {
                item_id,
                spender,
                expires,
            } => self.approve_item(sender, *item_id, spender, *expires, now),
            OperationKind::RevokeItem { item_id } => self.revoke_item(sender, *item_id, now),
            OperationKind::ApproveOperator { operator, expires } => {
                self.approve_operator(sender, operator, *expires, now)
            }
            OperationKind::RevokeOperator { operator } => self.revoke_operator(sender, operator),
            OperationKind::ApproveFungible {
                spender,
                amount,
                expires,
            } => self.approve_fungible(sender, spender, *amount, *expires, now),
            OperationKind::SetWhitelist {
                account,
                whitelisted,
            } => self.set_whitelist(sender, account, *whitelisted),
            OperationKind::SetLock { item_id, locked } => {
                self.set_lock(sender, *item_id, *locked)
            }
            OperationKind::MintFungible { recipient, amount } => {
                self.mint_fungible(sender, recipient, *amount)
            }
            OperationKind::BurnFungible { amount } => self.burn_fungible(sender, *amount),
        }
    }

    /// Move `amount` sub-units from `sender` to `recipient`, minting and
    /// burning items on both sides as whole-unit boundaries are crossed
    pub fn transfer_fungible(
        &mut self,
        sender: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|config, state, journal, events| {
            transfer_core(config, state, journal, events, sender, recipient, amount)
        })
    }

    /// Like [`Ledger::transfer_fungible`] but drawing on `owner`'s balance
    /// under a previously granted allowance
    pub fn transfer_fungible_from(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        recipient: &AccountId,
        amount: Amount,
        now: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|config, state, journal, events| {
            spend_allowance(state, journal, owner, spender, amount, now)?;
            transfer_core(config, state, journal, events, owner, recipient, amount)
        })
    }

    /// Move a specific item to `recipient`, together with one whole unit of
    /// backing balance.
    ///
    /// The sender must be the owner, the approved spender for the item, or an
    /// operator for the owner. The move clears the item's approval and lock,
    /// and keeps the rest of the owner's stack in acquisition order. Because
    /// exactly one whole unit travels with the item, no threshold mint or
    /// burn fires on either side.
    pub fn transfer_item(
        &mut self,
        sender: &AccountId,
        recipient: &AccountId,
        item_id: ItemId,
        now: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|config, state, journal, events| {
            let owner = state
                .item(item_id)
                .map(|record| record.owner.clone())
                .ok_or(LedgerError::UnknownItem { id: item_id })?;
            if !can_send_item(state, sender, item_id, &owner, now) {
                return Err(LedgerError::NotApproved { id: item_id });
            }
            if state.is_whitelisted(recipient) {
                return Err(LedgerError::WhitelistedRecipient {
                    account: recipient.clone(),
                });
            }

            let unit = config.unit;
            let owner_balance = state.balance(&owner);
            let debited =
                owner_balance
                    .checked_sub(unit)
                    .ok_or(LedgerError::InsufficientBalance {
                        required: unit,
                        available: owner_balance,
                    })?;
            state.set_balance(journal, &owner, debited);
            let credited = state
                .balance(recipient)
                .checked_add(unit)
                .ok_or(LedgerError::AmountOverflow)?;
            state.set_balance(journal, recipient, credited);

            let removed = state.remove_owned(journal, &owner, item_id);
            debug_assert!(removed, "registry and ownership index out of sync");
            state.push_owned(journal, recipient, item_id);
            state.put_item(journal, item_id, ItemRecord::new(recipient.clone()));
            state.set_item_approval(journal, item_id, None);

            events.push(LedgerEvent::FungibleTransferred {
                from: owner.clone(),
                to: recipient.clone(),
                amount: unit,
            });
            events.push(LedgerEvent::ItemTransferred {
                from: owner,
                to: recipient.clone(),
                id: item_id,
            });
            Ok(())
        })
    }

    /// Grant `spender` the right to move one item. Owner or operator only.
    pub fn approve_item(
        &mut self,
        sender: &AccountId,
        item_id: ItemId,
        spender: &AccountId,
        expires: Expiration,
        now: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|_config, state, journal, events| {
            let owner = item_authority(state, sender, item_id, now)?;
            if expires.is_expired(now) {
                return Err(LedgerError::Expired);
            }
            state.set_item_approval(
                journal,
                item_id,
                Some(ItemApproval::new(spender.clone(), expires)),
            );
            events.push(LedgerEvent::ItemApproved {
                owner,
                spender: spender.clone(),
                id: item_id,
            });
            Ok(())
        })
    }

    /// Clear the approval on one item. Owner or operator only.
    pub fn revoke_item(
        &mut self,
        sender: &AccountId,
        item_id: ItemId,
        now: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|_config, state, journal, events| {
            let owner = item_authority(state, sender, item_id, now)?;
            state.set_item_approval(journal, item_id, None);
            events.push(LedgerEvent::ItemApprovalRevoked { owner, id: item_id });
            Ok(())
        })
    }

    /// Grant `operator` blanket authority over all of the sender's items
    pub fn approve_operator(
        &mut self,
        sender: &AccountId,
        operator: &AccountId,
        expires: Expiration,
        now: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|_config, state, journal, events| {
            if expires.is_expired(now) {
                return Err(LedgerError::Expired);
            }
            state.set_operator(journal, sender, operator, Some(expires));
            events.push(LedgerEvent::OperatorApproved {
                owner: sender.clone(),
                operator: operator.clone(),
            });
            Ok(())
        })
    }

    /// Withdraw a blanket operator grant
    pub fn revoke_operator(
        &mut self,
        sender: &AccountId,
        operator: &AccountId,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|_config, state, journal, events| {
            state.set_operator(journal, sender, operator, None);
            events.push(LedgerEvent::OperatorRevoked {
                owner: sender.clone(),
                operator: operator.clone(),
            });
            Ok(())
        })
    }

    /// Set the fungible allowance for `spender` to exactly `amount`.
    ///
    /// Zero clears the entry. [`Amount::MAX`] grants an unlimited allowance
    /// that spending never debits.
    pub fn approve_fungible(
        &mut self,
        sender: &AccountId,
        spender: &AccountId,
        amount: Amount,
        expires: Expiration,
        now: u64,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|_config, state, journal, events| {
            if amount.is_zero() {
                state.set_allowance(journal, sender, spender, None);
            } else {
                if expires.is_expired(now) {
                    return Err(LedgerError::Expired);
                }
                state.set_allowance(
                    journal,
                    sender,
                    spender,
                    Some(Allowance::new(amount, expires)),
                );
            }
            events.push(LedgerEvent::AllowanceSet {
                owner: sender.clone(),
                spender: spender.clone(),
                amount,
            });
            Ok(())
        })
    }

    /// Add or remove an account from the threshold exemption whitelist.
    /// Admin only. The flag only affects future balance changes; existing
    /// items and balances are left exactly as they are.
    pub fn set_whitelist(
        &mut self,
        sender: &AccountId,
        account: &AccountId,
        whitelisted: bool,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|_config, state, journal, events| {
            if sender != state.admin() {
                return Err(LedgerError::Unauthorized);
            }
            state.set_whitelisted(journal, account, whitelisted);
            events.push(LedgerEvent::WhitelistSet {
                account: account.clone(),
                whitelisted,
            });
            Ok(())
        })
    }

    /// Lock or unlock an item. Owner only. While locked, the item vetoes any
    /// operation that would burn it from the top of the stack.
    pub fn set_lock(
        &mut self,
        sender: &AccountId,
        item_id: ItemId,
        locked: bool,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|_config, state, journal, events| {
            let record = state
                .item(item_id)
                .cloned()
                .ok_or(LedgerError::UnknownItem { id: item_id })?;
            if record.owner != *sender {
                return Err(LedgerError::NotOwner { id: item_id });
            }
            state.put_item(
                journal,
                item_id,
                ItemRecord {
                    owner: record.owner,
                    locked,
                },
            );
            events.push(LedgerEvent::LockSet {
                id: item_id,
                locked,
            });
            Ok(())
        })
    }

    /// Create new supply and credit it to `recipient`. Admin only.
    pub fn mint_fungible(
        &mut self,
        sender: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|config, state, journal, events| {
            if sender != state.admin() {
                return Err(LedgerError::Unauthorized);
            }
            let before = state.balance(recipient);
            let after = before
                .checked_add(amount)
                .ok_or(LedgerError::AmountOverflow)?;
            state.set_balance(journal, recipient, after);
            events.push(LedgerEvent::FungibleMinted {
                to: recipient.clone(),
                amount,
            });
            let unit = config.unit;
            threshold::reconcile(
                config,
                state,
                journal,
                events,
                recipient,
                before.whole_units(unit),
                after.whole_units(unit),
            )
        })
    }

    /// Destroy part of the sender's own balance
    pub fn burn_fungible(
        &mut self,
        sender: &AccountId,
        amount: Amount,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.with_journal(|config, state, journal, events| {
            let before = state.balance(sender);
            let after = before
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    required: amount,
                    available: before,
                })?;
            state.set_balance(journal, sender, after);
            events.push(LedgerEvent::FungibleBurned {
                from: sender.clone(),
                amount,
            });
            let unit = config.unit;
            threshold::reconcile(
                config,
                state,
                journal,
                events,
                sender,
                before.whole_units(unit),
                after.whole_units(unit),
            )
        })
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.state.balance(account)
    }

    /// The owner of an item and its current approval, if any.
    ///
    /// With `include_expired` false, an approval past its deadline is
    /// filtered out of the response.
    pub fn owner_of(
        &self,
        item_id: ItemId,
        include_expired: bool,
        now: u64,
    ) -> Result<(AccountId, Vec<ItemApproval>), LedgerError> {
        let record = self
            .state
            .item(item_id)
            .ok_or(LedgerError::UnknownItem { id: item_id })?;
        let approvals = self
            .state
            .item_approval(item_id)
            .filter(|approval| include_expired || !approval.is_expired(now))
            .cloned()
            .into_iter()
            .collect();
        Ok((record.owner.clone(), approvals))
    }

    /// An account's items in ascending identifier order, paged with an
    /// exclusive `start_after` cursor
    pub fn items_of(
        &self,
        owner: &AccountId,
        start_after: Option<ItemId>,
        limit: Option<u32>,
    ) -> Vec<ItemId> {
        let limit = self.config.clamp_limit(limit);
        let sorted = match self.state.owned(owner) {
            Some(stack) => stack.sorted_ids(),
            None => return Vec::new(),
        };
        sorted
            .into_iter()
            .filter(|id| match start_after {
                Some(cursor) => *id > cursor,
                None => true,
            })
            .take(limit)
            .collect()
    }

    /// All live items in ascending identifier order, paged like
    /// [`Ledger::items_of`]. Burned identifiers never reappear here.
    pub fn all_items(&self, start_after: Option<ItemId>, limit: Option<u32>) -> Vec<ItemId> {
        let limit = self.config.clamp_limit(limit);
        let lower = match start_after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        self.state
            .items()
            .range((lower, Bound::Unbounded))
            .map(|(id, _)| *id)
            .take(limit)
            .collect()
    }

    /// Number of currently live items
    pub fn total_supply(&self) -> u64 {
        self.state.live_item_count()
    }

    /// The stored allowance, expired or not
    pub fn allowance_of(&self, owner: &AccountId, spender: &AccountId) -> Option<Allowance> {
        self.state.allowance(owner, spender)
    }

    pub fn is_locked(&self, item_id: ItemId) -> Result<bool, LedgerError> {
        self.state
            .item(item_id)
            .map(|record| record.locked)
            .ok_or(LedgerError::UnknownItem { id: item_id })
    }

    pub fn is_whitelisted(&self, account: &AccountId) -> bool {
        self.state.is_whitelisted(account)
    }

    /// Balance and held items in acquisition order
    pub fn account_info(&self, account: &AccountId) -> (Amount, Vec<ItemId>) {
        let balance = self.state.balance(account);
        let items = self
            .state
            .owned(account)
            .map(|stack| stack.ids().to_vec())
            .unwrap_or_default();
        (balance, items)
    }

    pub fn admin(&self) -> &AccountId {
        self.state.admin()
    }
}

/// Balance move plus threshold reconciliation, shared by the direct and
/// allowance transfer paths.
///
/// Balances are re-read between the debit and the credit and again before
/// each reconciliation, so a transfer from an account to itself nets out to
/// no change instead of double-counting.
fn transfer_core(
    config: &LedgerConfig,
    state: &mut LedgerState,
    journal: &mut Journal,
    events: &mut Vec<LedgerEvent>,
    from: &AccountId,
    to: &AccountId,
    amount: Amount,
) -> Result<(), LedgerError> {
    let from_before = state.balance(from);
    let to_before = state.balance(to);

    let debited = from_before
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientBalance {
            required: amount,
            available: from_before,
        })?;
    state.set_balance(journal, from, debited);

    let credited = state
        .balance(to)
        .checked_add(amount)
        .ok_or(LedgerError::AmountOverflow)?;
    state.set_balance(journal, to, credited);

    events.push(LedgerEvent::FungibleTransferred {
        from: from.clone(),
        to: to.clone(),
        amount,
    });

    // Sender-side burns commit before recipient-side mints
    let unit = config.unit;
    let from_after = state.balance(from);
    threshold::reconcile(
        config,
        state,
        journal,
        events,
        from,
        from_before.whole_units(unit),
        from_after.whole_units(unit),
    )?;
    let to_after = state.balance(to);
    threshold::reconcile(
        config,
        state,
        journal,
        events,
        to,
        to_before.whole_units(unit),
        to_after.whole_units(unit),
    )?;
    Ok(())
}

/// Debit `amount` from the (owner, spender) allowance.
///
/// A missing or insufficient allowance reports what was available; a present
/// but expired one reports [`LedgerError::Expired`]. An unlimited allowance
/// is never debited. Hitting exactly zero removes the entry.
fn spend_allowance(
    state: &mut LedgerState,
    journal: &mut Journal,
    owner: &AccountId,
    spender: &AccountId,
    amount: Amount,
    now: u64,
) -> Result<(), LedgerError> {
    let allowance =
        state
            .allowance(owner, spender)
            .ok_or(LedgerError::AllowanceExceeded {
                required: amount,
                available: Amount::zero(),
            })?;
    if allowance.expires.is_expired(now) {
        return Err(LedgerError::Expired);
    }
    if allowance.amount == Amount::MAX {
        return Ok(());
    }
    let remaining =
        allowance
            .amount
            .checked_sub(amount)
            .ok_or(LedgerError::AllowanceExceeded {
                required: amount,
                available: allowance.amount,
            })?;
    let next = if remaining.is_zero() {
        None
    } else {
        Some(Allowance::new(remaining, allowance.expires))
    };
    state.set_allowance(journal, owner, spender, next);
    Ok(())
}

fn has_operator_approval(
    state: &LedgerState,
    owner: &AccountId,
    operator: &AccountId,
    now: u64,
) -> bool {
    matches!(
        state.operator_expiration(owner, operator),
        Some(expires) if !expires.is_expired(now)
    )
}

/// Whether `sender` may move this item: owner, unexpired approved spender,
/// or unexpired operator. Expired grants count as absent.
fn can_send_item(
    state: &LedgerState,
    sender: &AccountId,
    id: ItemId,
    owner: &AccountId,
    now: u64,
) -> bool {
    if sender == owner {
        return true;
    }
    if let Some(approval) = state.item_approval(id) {
        if approval.spender == *sender && !approval.is_expired(now) {
            return true;
        }
    }
    has_operator_approval(state, owner, sender, now)
}

/// Resolve the owner of an item and check that `sender` may manage its
/// approvals (owner or unexpired operator)
fn item_authority(
    state: &LedgerState,
    sender: &AccountId,
    id: ItemId,
    now: u64,
) -> Result<AccountId, LedgerError> {
    let owner = state
        .item(id)
        .map(|record| record.owner.clone())
        .ok_or(LedgerError::UnknownItem { id })?;
    if owner != *sender && !has_operator_approval(state, &owner, sender, now) {
        return Err(LedgerError::NotOwner { id });
    }
    Ok(owner)
}
