//! Property tests for bank reconciliation.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

use scoreworld::domain::model::{Group, Player};
use scoreworld::domain::reconciler::{FixedClock, GroupScoreReconciler};

const PLAYERS: usize = 4;

fn reconciler() -> GroupScoreReconciler {
    GroupScoreReconciler::new(Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    )))
}

fn group_with_bank(r: &GroupScoreReconciler, amount: u64) -> Group {
    let mut group = Group::new("Reds".to_string());
    group.players = (0..PLAYERS).map(|i| Player::new(format!("p{i}@x.io"))).collect();
    r.set_bank(&group, &amount.to_string(), r.now() + Duration::days(1))
        .unwrap()
}

fn bank(group: &Group) -> u64 {
    group.bank.as_ref().map(|b| b.amount).unwrap_or(0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Bank plus pending allocations is constant across any sequence of
    /// adjustments, accepted or rejected.
    #[test]
    fn prop_adjustments_conserve_bank(
        initial in 0u64..1_000,
        steps in prop::collection::vec((0..PLAYERS, 0u64..1_200), 0..40),
    ) {
        let r = reconciler();
        let mut group = group_with_bank(&r, initial);

        for (player, requested) in steps {
            let user_id = format!("p{player}@x.io");
            if let Ok(next) = r.adjust_pending_allocation(&group, &user_id, requested) {
                prop_assert_eq!(next.player(&user_id).map(|p| p.allocation_in(&next.id)), Some(requested));
                group = next;
            }
            prop_assert!(bank(&group) <= initial);
            prop_assert_eq!(bank(&group) + group.total_pending(), initial);
        }
    }

    /// Committing moves exactly the pending total into scores.
    #[test]
    fn prop_commit_moves_pending_into_scores(
        initial in 1u64..1_000,
        allocations in prop::collection::vec(0u64..300, PLAYERS),
        clear in any::<bool>(),
    ) {
        let r = reconciler();
        let mut group = group_with_bank(&r, initial);
        for (i, amount) in allocations.into_iter().enumerate() {
            if let Ok(next) = r.adjust_pending_allocation(&group, &format!("p{i}@x.io"), amount) {
                group = next;
            }
        }

        let pending = group.total_pending();
        let remaining = bank(&group);
        let committed = r.commit_bank_to_players(&group, clear).unwrap();

        prop_assert_eq!(committed.total_score(), group.total_score() + pending);
        prop_assert_eq!(committed.total_pending(), 0);
        if clear || remaining == 0 {
            prop_assert!(committed.bank.is_none());
        } else {
            prop_assert_eq!(bank(&committed), remaining);
        }
    }

    /// Removing a player hands its allocation back to the open bank.
    #[test]
    fn prop_removal_restores_allocation(
        initial in 1u64..1_000,
        amount in 0u64..1_000,
        victim in 0..PLAYERS,
    ) {
        let r = reconciler();
        let mut group = group_with_bank(&r, initial);
        let user_id = format!("p{victim}@x.io");
        if let Ok(next) = r.adjust_pending_allocation(&group, &user_id, amount) {
            group = next;
        }

        let removal = r.remove_player(&group, &user_id).unwrap();
        prop_assert!(!removal.group.contains(&user_id));
        prop_assert!(removal.returned_to_pool.pending.is_none());
        prop_assert_eq!(bank(&removal.group) + removal.group.total_pending(), initial);
    }
}
