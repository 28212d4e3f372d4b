use crate::state::{ItemRecord, Journal, LedgerState};
use duet_core::{AccountId, LedgerConfig, LedgerError, LedgerEvent};
use log::debug;

/// Bring an account's item count in line with its balance after a fungible
/// move.
///
/// `whole_before` and `whole_after` are the account's whole-unit counts on
/// either side of the balance write. A rise mints one item per whole unit
/// gained; a fall burns from the top of the account's stack, most recently
/// acquired first. Whitelisted accounts are left alone entirely.
///
/// A locked item at the top of the stack fails the whole operation with
/// [`LedgerError::LockedItemBurn`]; the caller unwinds the journal. If the
/// stack runs out before the deficit is covered (possible after an account
/// is removed from the whitelist), the remaining burns are skipped.
pub(crate) fn reconcile(
    config: &LedgerConfig,
    state: &mut LedgerState,
    journal: &mut Journal,
    events: &mut Vec<LedgerEvent>,
    account: &AccountId,
    whole_before: u128,
    whole_after: u128,
) -> Result<(), LedgerError> {
    if state.is_whitelisted(account) {
        return Ok(());
    }
    if whole_after > whole_before {
        for _ in 0..(whole_after - whole_before) {
            mint_one(config, state, journal, events, account)?;
        }
    } else if whole_before > whole_after {
        for _ in 0..(whole_before - whole_after) {
            if !burn_one(state, journal, events, account)? {
                break;
            }
        }
    }
    Ok(())
}

/// Mint a fresh item to `account` with the next identifier
fn mint_one(
    config: &LedgerConfig,
    state: &mut LedgerState,
    journal: &mut Journal,
    events: &mut Vec<LedgerEvent>,
    account: &AccountId,
) -> Result<(), LedgerError> {
    if let Some(max) = config.max_items {
        if state.live_item_count() >= max {
            return Err(LedgerError::SupplyExceeded { max });
        }
    }
    let id = state.allocate_item_id(journal);
    state.put_item(journal, id, ItemRecord::new(account.clone()));
    state.push_owned(journal, account, id);
    events.push(LedgerEvent::ItemMinted {
        owner: account.clone(),
        id,
    });
    debug!("Minted item {} to {}", id, account);
    Ok(())
}

/// Burn the item on top of `account`'s stack.
///
/// Returns `Ok(false)` when the account has nothing left to burn, which ends
/// the caller's loop. A locked item on top is an error, not a skip: the veto
/// aborts the operation that triggered the burn.
fn burn_one(
    state: &mut LedgerState,
    journal: &mut Journal,
    events: &mut Vec<LedgerEvent>,
    account: &AccountId,
) -> Result<bool, LedgerError> {
    let top = match state.owned(account).and_then(|stack| stack.top()) {
        Some(id) => id,
        None => return Ok(false),
    };
    if state.item(top).map(|record| record.locked).unwrap_or(false) {
        return Err(LedgerError::LockedItemBurn { id: top });
    }
    if state.pop_owned(journal, account).is_none() {
        return Ok(false);
    }
    state.set_item_approval(journal, top, None);
    state.remove_item(journal, top);
    events.push(LedgerEvent::ItemBurned {
        owner: account.clone(),
        id: top,
    });
    debug!("Burned item {} from {}", top, account);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_core::{Amount, Expiration, ItemApproval, ItemId};

    fn account(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn config() -> LedgerConfig {
        LedgerConfig::new(Amount::new(1000)).unwrap()
    }

    /// Give `account` `count` items through the mint path
    fn mint_items(
        config: &LedgerConfig,
        state: &mut LedgerState,
        account: &AccountId,
        count: u128,
    ) -> Vec<ItemId> {
        let mut journal = Journal::new();
        let mut events = Vec::new();
        reconcile(config, state, &mut journal, &mut events, account, 0, count).unwrap();
        events
            .iter()
            .filter_map(|event| match event {
                LedgerEvent::ItemMinted { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_rise_mints_one_item_per_whole_unit() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let ids = mint_items(&config, &mut state, &alice, 2);

        assert_eq!(ids, vec![ItemId::new(1), ItemId::new(2)]);
        assert_eq!(state.live_item_count(), 2);
        assert_eq!(state.owned(&alice).unwrap().ids(), &[ids[0], ids[1]]);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_fall_burns_most_recent_first() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let ids = mint_items(&config, &mut state, &alice, 3);

        let mut journal = Journal::new();
        let mut events = Vec::new();
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 3, 1).unwrap();

        assert_eq!(
            events,
            vec![
                LedgerEvent::ItemBurned {
                    owner: alice.clone(),
                    id: ids[2],
                },
                LedgerEvent::ItemBurned {
                    owner: alice.clone(),
                    id: ids[1],
                },
            ]
        );
        assert_eq!(state.owned(&alice).unwrap().ids(), &[ids[0]]);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_burned_identifiers_are_not_reused() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        mint_items(&config, &mut state, &alice, 2);

        let mut journal = Journal::new();
        let mut events = Vec::new();
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 2, 0).unwrap();
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 0, 1).unwrap();

        // Items 1 and 2 are gone for good; the re-mint gets 3
        assert_eq!(state.owned(&alice).unwrap().ids(), &[ItemId::new(3)]);
    }

    #[test]
    fn test_locked_top_vetoes_the_burn() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let ids = mint_items(&config, &mut state, &alice, 2);

        let mut journal = Journal::new();
        state.put_item(
            &mut journal,
            ids[1],
            ItemRecord {
                owner: alice.clone(),
                locked: true,
            },
        );

        let mut events = Vec::new();
        let err = reconcile(&config, &mut state, &mut journal, &mut events, &alice, 2, 0)
            .unwrap_err();
        assert_eq!(err, LedgerError::LockedItemBurn { id: ids[1] });
    }

    #[test]
    fn test_locked_below_top_does_not_veto() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let ids = mint_items(&config, &mut state, &alice, 2);

        let mut journal = Journal::new();
        state.put_item(
            &mut journal,
            ids[0],
            ItemRecord {
                owner: alice.clone(),
                locked: true,
            },
        );

        // Only the top of the stack is consulted; a deeper lock stops the
        // second burn when it surfaces
        let mut events = Vec::new();
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 2, 1).unwrap();
        assert_eq!(state.owned(&alice).unwrap().ids(), &[ids[0]]);
    }

    #[test]
    fn test_whitelisted_account_is_untouched() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let mut journal = Journal::new();
        state.set_whitelisted(&mut journal, &alice, true);

        let mut events = Vec::new();
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 0, 5).unwrap();
        assert!(events.is_empty());
        assert_eq!(state.live_item_count(), 0);
    }

    #[test]
    fn test_short_stack_burns_what_it_can() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        // Whitelisted while the balance rose, so no items were minted
        let mut journal = Journal::new();
        state.set_whitelisted(&mut journal, &alice, true);
        let mut events = Vec::new();
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 0, 3).unwrap();
        state.set_whitelisted(&mut journal, &alice, false);

        // The fall asks for three burns but the stack is empty
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 3, 0).unwrap();
        assert!(events.is_empty());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_supply_cap_stops_the_mint() {
        let config = LedgerConfig::new(Amount::new(1000)).unwrap().with_max_items(1);
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));

        let mut journal = Journal::new();
        let mut events = Vec::new();
        let err = reconcile(&config, &mut state, &mut journal, &mut events, &alice, 0, 2)
            .unwrap_err();
        assert_eq!(err, LedgerError::SupplyExceeded { max: 1 });
    }

    #[test]
    fn test_burn_clears_item_approval() {
        let config = config();
        let alice = account("alice");
        let mut state = LedgerState::new(account("admin"));
        let ids = mint_items(&config, &mut state, &alice, 1);

        let mut journal = Journal::new();
        state.set_item_approval(
            &mut journal,
            ids[0],
            Some(ItemApproval::new(account("bob"), Expiration::Never)),
        );

        let mut events = Vec::new();
        reconcile(&config, &mut state, &mut journal, &mut events, &alice, 1, 0).unwrap();
        assert!(state.item_approval(ids[0]).is_none());
        assert!(state.is_consistent());
    }
}
