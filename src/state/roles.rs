use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Seat number inside a room (1-based, allocated once and never renumbered).
pub type SeatId = u8;

/// Closed set of roles a seat can hold for the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Night killer; wins when werewolves reach parity with everyone else.
    Werewolf,
    /// Plain townsfolk with no night action.
    Villager,
    /// Checks one seat's role per night.
    Seer,
    /// Holds one save potion and one poison potion for the whole game.
    Witch,
    /// Passive special role in this rule set.
    Hunter,
}

impl Role {
    /// Whether the role belongs to the werewolf faction.
    pub fn is_werewolf(self) -> bool {
        matches!(self, Role::Werewolf)
    }
}

/// Who drives a seat's actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    /// The single human participant.
    Human,
    /// An AI agent relayed by the reconciler.
    Agent,
}

/// A numbered slot a participant occupies for the game's duration.
///
/// Death only flips `alive`; the seat stays in the roster.
#[derive(Debug, Clone)]
pub struct Seat {
    /// Stable 1-based seat number.
    pub number: SeatId,
    /// Role dealt at assignment time.
    pub role: Role,
    /// Cleared when the seat is eliminated.
    pub alive: bool,
    /// Human or agent controlled.
    pub controller: Controller,
}

/// Role pool for a given table size.
///
/// The 12-seat table is the standard balance (2 werewolves, seer, witch,
/// hunter, 7 villagers). Other sizes scale the same shape down: roughly a
/// sixth of the table are werewolves and up to three special roles are
/// drawn in seer, witch, hunter order.
pub fn role_pool(seat_count: u8) -> Vec<Role> {
    if seat_count == 12 {
        let mut pool = vec![Role::Werewolf, Role::Werewolf, Role::Seer, Role::Witch, Role::Hunter];
        pool.resize(12, Role::Villager);
        return pool;
    }

    let n = seat_count as usize;
    let werewolves = (n / 6).max(1);
    let specials = (n / 4).min(3);

    let mut pool = vec![Role::Werewolf; werewolves];
    pool.extend([Role::Seer, Role::Witch, Role::Hunter].into_iter().take(specials));
    pool.resize(n, Role::Villager);
    pool
}

/// Deal a uniformly random seat-to-role bijection for `seat_count` seats.
///
/// The pool is shuffled with `rand`'s Fisher-Yates implementation; position
/// `i` of the result is the role of seat `i + 1`.
pub fn deal_roles(seat_count: u8) -> Vec<Role> {
    let mut pool = role_pool(seat_count);
    let mut rng = rand::rng();
    pool.shuffle(&mut rng);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(pool: &[Role], role: Role) -> usize {
        pool.iter().filter(|r| **r == role).count()
    }

    #[test]
    fn standard_twelve_seat_pool() {
        let pool = role_pool(12);
        assert_eq!(pool.len(), 12);
        assert_eq!(count(&pool, Role::Werewolf), 2);
        assert_eq!(count(&pool, Role::Seer), 1);
        assert_eq!(count(&pool, Role::Witch), 1);
        assert_eq!(count(&pool, Role::Hunter), 1);
        assert_eq!(count(&pool, Role::Villager), 7);
    }

    #[test]
    fn small_table_keeps_one_werewolf() {
        let pool = role_pool(6);
        assert_eq!(pool.len(), 6);
        assert_eq!(count(&pool, Role::Werewolf), 1);
        assert_eq!(count(&pool, Role::Seer), 1);
        assert_eq!(count(&pool, Role::Villager), 4);
    }

    #[test]
    fn deal_is_a_bijection() {
        let dealt = deal_roles(12);
        assert_eq!(dealt.len(), 12);
        let mut sorted = dealt.clone();
        let mut pool = role_pool(12);
        sorted.sort_by_key(|r| format!("{r:?}"));
        pool.sort_by_key(|r| format!("{r:?}"));
        assert_eq!(sorted, pool);
    }

    #[test]
    fn shuffle_is_roughly_uniform() {
        // Seat 1 should draw werewolf about 2/12 of the time. 2000 trials
        // keeps the band wide enough to be deterministic in practice.
        let trials = 2000;
        let hits = (0..trials)
            .filter(|_| deal_roles(12)[0] == Role::Werewolf)
            .count();
        let expected = trials / 6;
        assert!(
            hits > expected / 2 && hits < expected * 2,
            "seat 1 drew werewolf {hits} times out of {trials}"
        );
    }
}
