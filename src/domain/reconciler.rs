//! Score-bank reconciliation.
//!
//! Pure transformations from a current [`Group`] snapshot and a requested
//! change to the next group value. Nothing is retained between calls; the
//! caller persists the returned value.
//!
//! Invariants upheld by every operation:
//! - the bank amount never goes below zero;
//! - every pending allocation references the group it lives in;
//! - bank decreases are exactly matched by pending allocation increases
//!   (and vice versa);
//! - committed scores change only on commit or an explicit override;
//! - the leader, when set, is a player of the group.

use crate::domain::error::Rejection;
use crate::domain::model::{Group, PendingAllocation, PendingBank, Player};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

/// Largest amount or score the store can hold.
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// Source of "now" for bank expiration checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Result of removing a player from a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub group: Group,
    /// The evicted player, stripped of any pending allocation, ready for the
    /// world's pending pool.
    pub returned_to_pool: Player,
}

/// Result of evaluating a group against the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub group: Group,
    /// True when an expired bank was committed and cleared.
    pub expired: bool,
}

#[derive(Clone)]
pub struct GroupScoreReconciler {
    clock: Arc<dyn Clock>,
}

impl Default for GroupScoreReconciler {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for GroupScoreReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupScoreReconciler")
            .field("now", &self.clock.now())
            .finish()
    }
}

impl GroupScoreReconciler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Opens (or replaces) the group's bank.
    pub fn set_bank(
        &self,
        group: &Group,
        amount: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Group, Rejection> {
        let amount = parse_amount(amount).ok_or_else(|| Rejection::InvalidAmount(amount.to_string()))?;
        if expires_at <= self.now() {
            return Err(Rejection::InvalidExpiration);
        }

        let mut next = group.clone();
        next.bank = Some(PendingBank::new(amount, expires_at));
        Ok(next)
    }

    /// Moves score between the bank and one player's pending allocation.
    ///
    /// Increments need a non-empty bank large enough to cover the difference;
    /// decrements need an existing allocation. The difference is returned to
    /// or taken from the bank.
    pub fn adjust_pending_allocation(
        &self,
        group: &Group,
        user_id: &str,
        requested: u64,
    ) -> Result<Group, Rejection> {
        if requested > MAX_AMOUNT {
            return Err(Rejection::InvalidAmount(requested.to_string()));
        }
        let bank = group.bank.as_ref().ok_or(Rejection::NoOpenBank)?;
        if bank.is_expired(self.now()) {
            return Err(Rejection::BankExpired(bank.expires_at));
        }
        let index = group
            .position(user_id)
            .ok_or_else(|| Rejection::PlayerNotFound(user_id.to_string()))?;
        let previous = group.players[index].allocation_in(&group.id);

        let remaining = match requested.cmp(&previous) {
            Ordering::Equal => return Err(Rejection::Unchanged(previous)),
            Ordering::Greater => {
                if bank.amount == 0 {
                    return Err(Rejection::BankExhausted);
                }
                let delta = requested - previous;
                if delta > bank.amount {
                    return Err(Rejection::InsufficientBank {
                        available: bank.amount,
                        requested: delta,
                    });
                }
                bank.amount - delta
            }
            Ordering::Less => add_amount(bank.amount, previous - requested)?,
        };

        let mut next = group.clone();
        next.players[index].pending = Some(PendingAllocation {
            amount: requested,
            group_id: group.id.clone(),
        });
        next.bank = Some(PendingBank::new(remaining, bank.expires_at));
        Ok(next)
    }

    /// Folds every positive pending allocation into its player's score and
    /// clears all allocations.
    ///
    /// The bank is dropped when it is empty or `clear_bank` is set; any other
    /// remaining balance stays open for the next distribution round.
    pub fn commit_bank_to_players(&self, group: &Group, clear_bank: bool) -> Result<Group, Rejection> {
        let bank = group.bank.as_ref().ok_or(Rejection::NoOpenBank)?;

        let mut next = group.clone();
        for player in &mut next.players {
            let committed = player.allocation_in(&group.id);
            player.score = add_amount(player.score, committed)?;
            player.pending = None;
        }
        next.bank = if bank.amount == 0 || clear_bank {
            None
        } else {
            Some(bank.clone())
        };
        Ok(next)
    }

    /// Admin override of a player's committed score.
    pub fn set_player_score(&self, group: &Group, user_id: &str, score: &str) -> Result<Group, Rejection> {
        let score = parse_amount(score).ok_or_else(|| Rejection::InvalidScore(score.to_string()))?;
        let index = group
            .position(user_id)
            .ok_or_else(|| Rejection::PlayerNotFound(user_id.to_string()))?;

        let mut next = group.clone();
        next.players[index].score = score;
        Ok(next)
    }

    pub fn transfer_leader(&self, group: &Group, user_id: &str) -> Result<Group, Rejection> {
        if !group.contains(user_id) {
            return Err(Rejection::PlayerNotFound(user_id.to_string()));
        }
        let mut next = group.clone();
        next.leader = Some(user_id.to_string());
        Ok(next)
    }

    pub fn clear_leader(&self, group: &Group) -> Group {
        let mut next = group.clone();
        next.leader = None;
        next
    }

    /// Evicts a player, returning any allocation it held to the open bank.
    pub fn remove_player(&self, group: &Group, user_id: &str) -> Result<Removal, Rejection> {
        let index = group
            .position(user_id)
            .ok_or_else(|| Rejection::PlayerNotFound(user_id.to_string()))?;

        let mut next = group.clone();
        if next.is_leader(user_id) {
            next.leader = None;
        }

        let mut player = next.players.remove(index);
        let held = player.allocation_in(&group.id);
        if let Some(bank) = next.bank.as_mut() {
            bank.amount = add_amount(bank.amount, held)?;
        }
        player.pending = None;

        Ok(Removal {
            group: next,
            returned_to_pool: player,
        })
    }

    /// Brings a snapshot up to date: drops allocations that reference other
    /// groups and, when the bank has expired, commits it with the bank
    /// cleared.
    pub fn evaluate(&self, group: &Group) -> Evaluation {
        let mut next = group.clone();
        for player in &mut next.players {
            if player
                .pending
                .as_ref()
                .is_some_and(|pending| pending.group_id != group.id)
            {
                player.pending = None;
            }
        }

        let expired = next
            .bank
            .as_ref()
            .is_some_and(|bank| bank.is_expired(self.now()));
        if !expired {
            return Evaluation { group: next, expired };
        }

        match self.commit_bank_to_players(&next, true) {
            Ok(committed) => Evaluation {
                group: committed,
                expired: true,
            },
            Err(e) => {
                tracing::warn!("Expired bank of group {} left open: {}", group.id, e);
                Evaluation { group: next, expired: false }
            }
        }
    }
}

fn parse_amount(input: &str) -> Option<u64> {
    input.trim().parse::<u64>().ok().filter(|v| *v <= MAX_AMOUNT)
}

fn add_amount(current: u64, delta: u64) -> Result<u64, Rejection> {
    current
        .checked_add(delta)
        .filter(|v| *v <= MAX_AMOUNT)
        .ok_or(Rejection::AmountOverflow { current, delta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn reconciler() -> GroupScoreReconciler {
        GroupScoreReconciler::new(Arc::new(FixedClock(now())))
    }

    fn group_with(players: &[(&str, u64)]) -> Group {
        let mut group = Group::new("Reds".into());
        group.id = "g1".into();
        group.players = players
            .iter()
            .map(|(id, score)| Player {
                user_id: id.to_string(),
                score: *score,
                pending: None,
            })
            .collect();
        group
    }

    fn with_bank(mut group: Group, amount: u64) -> Group {
        group.bank = Some(PendingBank::new(amount, now() + Duration::days(1)));
        group
    }

    fn pending(group: &Group, id: &str) -> Option<u64> {
        group.player(id).and_then(|p| p.pending.as_ref()).map(|p| p.amount)
    }

    #[test]
    fn test_set_bank() {
        let r = reconciler();
        let group = group_with(&[("a", 0)]);
        let tomorrow = now() + Duration::days(1);

        let next = r.set_bank(&group, " 10 ", tomorrow).unwrap();
        assert_eq!(next.bank, Some(PendingBank::new(10, tomorrow)));
        assert_eq!(next.players, group.players);
    }

    #[test]
    fn test_set_bank_rejects_negative_amount() {
        let r = reconciler();
        let group = group_with(&[("a", 0)]);

        assert_eq!(
            r.set_bank(&group, "-3", now() + Duration::days(1)),
            Err(Rejection::InvalidAmount("-3".into()))
        );
        assert_eq!(
            r.set_bank(&group, "ten", now() + Duration::days(1)),
            Err(Rejection::InvalidAmount("ten".into()))
        );
        assert_eq!(group.bank, None);
    }

    #[test]
    fn test_set_bank_rejects_past_expiration() {
        let r = reconciler();
        let group = group_with(&[]);
        assert_eq!(r.set_bank(&group, "5", now()), Err(Rejection::InvalidExpiration));
        assert_eq!(
            r.set_bank(&group, "5", now() - Duration::hours(1)),
            Err(Rejection::InvalidExpiration)
        );
    }

    #[test]
    fn test_allocate_release_commit_scenario() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", 3)]), 10);

        let group = r.adjust_pending_allocation(&group, "a", 4).unwrap();
        assert_eq!(group.bank.as_ref().map(|b| b.amount), Some(6));
        assert_eq!(pending(&group, "a"), Some(4));

        let group = r.adjust_pending_allocation(&group, "a", 2).unwrap();
        assert_eq!(group.bank.as_ref().map(|b| b.amount), Some(8));
        assert_eq!(pending(&group, "a"), Some(2));

        let group = r.commit_bank_to_players(&group, false).unwrap();
        assert_eq!(group.player("a").map(|p| p.score), Some(5));
        assert_eq!(pending(&group, "a"), None);
        assert_eq!(group.bank.as_ref().map(|b| b.amount), Some(8));
    }

    #[test]
    fn test_adjust_requires_open_bank() {
        let r = reconciler();
        let group = group_with(&[("a", 0)]);
        assert_eq!(r.adjust_pending_allocation(&group, "a", 1), Err(Rejection::NoOpenBank));
    }

    #[test]
    fn test_adjust_rejects_expired_bank() {
        let r = reconciler();
        let mut group = group_with(&[("a", 0)]);
        let expired_at = now() - Duration::minutes(1);
        group.bank = Some(PendingBank::new(5, expired_at));

        assert_eq!(
            r.adjust_pending_allocation(&group, "a", 1),
            Err(Rejection::BankExpired(expired_at))
        );
    }

    #[test]
    fn test_adjust_guards() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", 0), ("b", 0)]), 3);

        assert_eq!(
            r.adjust_pending_allocation(&group, "zed", 1),
            Err(Rejection::PlayerNotFound("zed".into()))
        );
        assert_eq!(r.adjust_pending_allocation(&group, "a", 0), Err(Rejection::Unchanged(0)));
        assert_eq!(
            r.adjust_pending_allocation(&group, "a", 4),
            Err(Rejection::InsufficientBank { available: 3, requested: 4 })
        );

        let group = r.adjust_pending_allocation(&group, "a", 3).unwrap();
        assert_eq!(r.adjust_pending_allocation(&group, "b", 1), Err(Rejection::BankExhausted));

        // Releasing is still allowed on an empty bank.
        let group = r.adjust_pending_allocation(&group, "a", 0).unwrap();
        assert_eq!(group.bank.as_ref().map(|b| b.amount), Some(3));
        assert_eq!(pending(&group, "a"), Some(0));
    }

    #[test]
    fn test_adjust_treats_foreign_allocation_as_zero() {
        let r = reconciler();
        let mut group = with_bank(group_with(&[("a", 0)]), 5);
        group.players[0].pending = Some(PendingAllocation {
            amount: 4,
            group_id: "other".into(),
        });

        let next = r.adjust_pending_allocation(&group, "a", 2).unwrap();
        assert_eq!(next.bank.as_ref().map(|b| b.amount), Some(3));
        assert_eq!(
            next.players[0].pending,
            Some(PendingAllocation { amount: 2, group_id: "g1".into() })
        );
    }

    #[test]
    fn test_commit_clears_empty_bank() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", 1), ("b", 2)]), 5);
        let group = r.adjust_pending_allocation(&group, "a", 2).unwrap();
        let group = r.adjust_pending_allocation(&group, "b", 3).unwrap();

        let committed = r.commit_bank_to_players(&group, false).unwrap();
        assert_eq!(committed.bank, None);
        assert_eq!(committed.player("a").map(|p| p.score), Some(3));
        assert_eq!(committed.player("b").map(|p| p.score), Some(5));
        assert!(committed.players.iter().all(|p| p.pending.is_none()));

        assert_eq!(r.commit_bank_to_players(&committed, false), Err(Rejection::NoOpenBank));
    }

    #[test]
    fn test_commit_twice_keeps_scores() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", 1)]), 5);
        let group = r.adjust_pending_allocation(&group, "a", 2).unwrap();

        let first = r.commit_bank_to_players(&group, false).unwrap();
        let second = r.commit_bank_to_players(&first, false).unwrap();
        assert_eq!(first.players, second.players);
        assert_eq!(second.player("a").map(|p| p.score), Some(3));
    }

    #[test]
    fn test_commit_with_clear_flag_and_stale_allocation() {
        let r = reconciler();
        let mut group = with_bank(group_with(&[("a", 1), ("b", 1)]), 5);
        group.players[1].pending = Some(PendingAllocation {
            amount: 7,
            group_id: "other".into(),
        });

        let committed = r.commit_bank_to_players(&group, true).unwrap();
        assert_eq!(committed.bank, None);
        assert_eq!(committed.player("b").map(|p| p.score), Some(1));
        assert_eq!(committed.player("b").and_then(|p| p.pending.clone()), None);
    }

    #[test]
    fn test_set_player_score() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", 1)]), 5);

        let next = r.set_player_score(&group, "a", "42").unwrap();
        assert_eq!(next.player("a").map(|p| p.score), Some(42));
        assert_eq!(next.bank, group.bank);

        assert_eq!(
            r.set_player_score(&group, "a", "4x"),
            Err(Rejection::InvalidScore("4x".into()))
        );
        assert_eq!(
            r.set_player_score(&group, "zed", "1"),
            Err(Rejection::PlayerNotFound("zed".into()))
        );
    }

    #[test]
    fn test_leader_transfer_and_clear() {
        let r = reconciler();
        let group = group_with(&[("a", 0), ("b", 0)]);

        let led = r.transfer_leader(&group, "b").unwrap();
        assert!(led.is_leader("b"));
        assert_eq!(
            r.transfer_leader(&group, "zed"),
            Err(Rejection::PlayerNotFound("zed".into()))
        );
        assert_eq!(r.clear_leader(&led).leader, None);
    }

    #[test]
    fn test_remove_player_returns_allocation() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", 4), ("b", 0)]), 10);
        let group = r.adjust_pending_allocation(&group, "a", 5).unwrap();
        let group = r.transfer_leader(&group, "a").unwrap();

        let removal = r.remove_player(&group, "a").unwrap();
        assert_eq!(removal.group.bank.as_ref().map(|b| b.amount), Some(10));
        assert_eq!(removal.group.leader, None);
        assert!(!removal.group.contains("a"));
        assert_eq!(removal.returned_to_pool.score, 4);
        assert_eq!(removal.returned_to_pool.pending, None);
    }

    #[test]
    fn test_remove_player_without_bank() {
        let r = reconciler();
        let mut group = group_with(&[("a", 4)]);
        group.players[0].pending = Some(PendingAllocation {
            amount: 2,
            group_id: "g1".into(),
        });

        let removal = r.remove_player(&group, "a").unwrap();
        assert_eq!(removal.group.bank, None);
        assert_eq!(removal.returned_to_pool.pending, None);
        assert_eq!(
            r.remove_player(&removal.group, "a"),
            Err(Rejection::PlayerNotFound("a".into()))
        );
    }

    #[test]
    fn test_evaluate_expired_bank_commits_and_clears() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", 1)]), 6);
        let mut group = r.adjust_pending_allocation(&group, "a", 4).unwrap();
        if let Some(bank) = group.bank.as_mut() {
            bank.expires_at = now() - Duration::seconds(1);
        }

        let evaluation = r.evaluate(&group);
        assert!(evaluation.expired);
        assert_eq!(evaluation.group.bank, None);
        assert_eq!(evaluation.group.player("a").map(|p| p.score), Some(5));
    }

    #[test]
    fn test_evaluate_live_bank_drops_stale_allocations() {
        let r = reconciler();
        let mut group = with_bank(group_with(&[("a", 1)]), 6);
        group.players[0].pending = Some(PendingAllocation {
            amount: 2,
            group_id: "other".into(),
        });

        let evaluation = r.evaluate(&group);
        assert!(!evaluation.expired);
        assert_eq!(evaluation.group.bank, group.bank);
        assert_eq!(evaluation.group.players[0].pending, None);
    }

    #[test]
    fn test_amounts_beyond_storable_range_are_invalid() {
        let r = reconciler();
        let group = group_with(&[("a", 0)]);
        let too_big = (MAX_AMOUNT + 1).to_string();

        assert_eq!(
            r.set_bank(&group, &too_big, now() + Duration::days(1)),
            Err(Rejection::InvalidAmount(too_big.clone()))
        );
        assert_eq!(
            r.set_player_score(&group, "a", "18446744073709551615"),
            Err(Rejection::InvalidScore("18446744073709551615".into()))
        );
        let next = r.set_player_score(&group, "a", &MAX_AMOUNT.to_string()).unwrap();
        assert_eq!(next.player("a").map(|p| p.score), Some(MAX_AMOUNT));
    }

    #[test]
    fn test_commit_rejects_score_overflow() {
        let r = reconciler();
        let group = with_bank(group_with(&[("a", MAX_AMOUNT)]), 3);
        let group = r.adjust_pending_allocation(&group, "a", 2).unwrap();

        assert_eq!(
            r.commit_bank_to_players(&group, false),
            Err(Rejection::AmountOverflow {
                current: MAX_AMOUNT,
                delta: 2
            })
        );
    }

    #[test]
    fn test_release_rejects_bank_overflow() {
        let r = reconciler();
        let mut group = with_bank(group_with(&[("a", 0)]), MAX_AMOUNT);
        group.players[0].pending = Some(PendingAllocation {
            amount: 5,
            group_id: "g1".into(),
        });

        assert_eq!(
            r.adjust_pending_allocation(&group, "a", 1),
            Err(Rejection::AmountOverflow {
                current: MAX_AMOUNT,
                delta: 4
            })
        );
        assert_eq!(
            r.adjust_pending_allocation(&group, "a", MAX_AMOUNT + 1),
            Err(Rejection::InvalidAmount((MAX_AMOUNT + 1).to_string()))
        );
        assert!(matches!(
            r.remove_player(&group, "a"),
            Err(Rejection::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_evaluate_keeps_bank_when_commit_overflows() {
        let r = reconciler();
        let mut group = with_bank(group_with(&[("a", MAX_AMOUNT)]), 0);
        group.players[0].pending = Some(PendingAllocation {
            amount: 1,
            group_id: "g1".into(),
        });
        if let Some(bank) = group.bank.as_mut() {
            bank.expires_at = now() - Duration::seconds(1);
        }

        let evaluation = r.evaluate(&group);
        assert!(!evaluation.expired);
        assert_eq!(evaluation.group, group);
    }
}
