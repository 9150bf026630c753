//! Cache reconciliation after mutations
//!
//! Declarative table: which cached resources a successful mutation makes
//! stale. A failed mutation invalidates nothing.

use crate::cache::CacheScope;

/// Server-side mutations the client can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Transfer,
    UpiTopUp,
    CardTopUp,
    AddCard,
    DeleteCard,
    AddFriend,
    RemoveFriend,
    CurrencyChange,
    Login,
}

impl Mutation {
    /// Scopes to invalidate once this mutation has succeeded
    pub fn invalidates(&self) -> &'static [CacheScope] {
        match self {
            Mutation::Transfer | Mutation::UpiTopUp => &[
                CacheScope::Transactions,
                CacheScope::Balance,
                CacheScope::CurrentUser,
            ],
            // A new card may have been saved during the top-up
            Mutation::CardTopUp => &[
                CacheScope::Cards,
                CacheScope::Balance,
                CacheScope::CurrentUser,
                CacheScope::Transactions,
            ],
            Mutation::AddCard | Mutation::DeleteCard => &[CacheScope::Cards],
            Mutation::AddFriend | Mutation::RemoveFriend => &[CacheScope::Friends],
            Mutation::CurrencyChange => &[CacheScope::CurrentUser],
            Mutation::Login => &[CacheScope::CurrentUser, CacheScope::Balance],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_movement_invalidates_balance_and_history() {
        for m in [Mutation::Transfer, Mutation::UpiTopUp, Mutation::CardTopUp] {
            let scopes = m.invalidates();
            assert!(scopes.contains(&CacheScope::Balance), "{:?}", m);
            assert!(scopes.contains(&CacheScope::CurrentUser), "{:?}", m);
            assert!(scopes.contains(&CacheScope::Transactions), "{:?}", m);
        }
    }

    #[test]
    fn test_side_mutations_stay_narrow() {
        assert_eq!(Mutation::AddFriend.invalidates(), &[CacheScope::Friends]);
        assert_eq!(Mutation::DeleteCard.invalidates(), &[CacheScope::Cards]);
        assert_eq!(Mutation::CurrencyChange.invalidates(), &[CacheScope::CurrentUser]);
    }

    #[test]
    fn test_only_card_top_up_touches_cards() {
        assert!(Mutation::CardTopUp.invalidates().contains(&CacheScope::Cards));
        assert!(!Mutation::UpiTopUp.invalidates().contains(&CacheScope::Cards));
        assert!(!Mutation::Transfer.invalidates().contains(&CacheScope::Cards));
    }
}
