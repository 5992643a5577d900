use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::roles::{Controller, Role, Seat, SeatId, deal_roles};
use crate::state::rotation::{NIGHT_ORDER, night_prompt, plurality};
use crate::state::session::{AnnouncementKind, GameMessageBody, NightState, Session};

/// Phases of the fixed day/night cycle.
///
/// The cycle is `waiting -> role_assigned -> day_discussion -> day_voting
/// -> day_result -> night_action -> night_result -> day_discussion ...`,
/// with any settlement that detects a faction win short-circuiting into
/// `game_over`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No game yet; the only legal operation is role assignment.
    #[default]
    Waiting,
    /// Roles dealt; held until a poller triggers the first advance.
    RoleAssigned,
    /// Seats speak in the fixed speaking order.
    DayDiscussion,
    /// Alive seats cast (and may re-cast) their votes.
    DayVoting,
    /// The vote outcome is on display.
    DayResult,
    /// Night roles act in werewolf, seer, witch order.
    NightAction,
    /// The night outcome is on display.
    NightResult,
    /// Terminal. Advancing from here is a no-op.
    GameOver,
}

/// Faction outcome of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    /// No win condition met yet.
    #[default]
    Ongoing,
    /// Werewolves reached parity with the rest of the table.
    WerewolfWin,
    /// Every werewolf is dead.
    VillagerWin,
}

/// Cause of a settlement death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KilledBy {
    /// Daytime plurality vote.
    Vote,
    /// Werewolf pack kill.
    Werewolf,
    /// Witch poison.
    Witch,
}

/// Death record surfaced to clients after a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadPlayer {
    /// Seat that died.
    pub seat: SeatId,
    /// Role revealed on death.
    pub role: Role,
    /// Cause of death.
    pub killed_by: KilledBy,
}

/// Duration budgets for the timed phases.
#[derive(Debug, Clone)]
pub struct PhaseTimings {
    /// Day discussion budget.
    pub discussion: Duration,
    /// Day voting budget.
    pub voting: Duration,
    /// Whole-night budget; expiry skips unfinished roles.
    pub night: Duration,
    /// How long each result reveal stays on screen.
    pub result_reveal: Duration,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            discussion: Duration::from_secs(120),
            voting: Duration::from_secs(20),
            night: Duration::from_secs(120),
            result_reveal: Duration::from_secs(5),
        }
    }
}

/// Error returned when dealing roles into a session twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("roles have already been assigned for this room")]
pub struct AlreadyAssigned;

/// Outcome of an advance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseAdvance {
    /// Phase after the call (unchanged when the call was a no-op).
    pub phase: Phase,
    /// Duration budget of that phase.
    pub duration: Duration,
    /// Whether a transition actually happened.
    pub changed: bool,
}

impl Session {
    /// Deal a uniformly random role bijection and commit it atomically.
    ///
    /// Legal exactly once per session; any later call fails with
    /// [`AlreadyAssigned`] and leaves the roster untouched.
    pub fn assign_roles(
        &mut self,
        seat_count: u8,
        human_seat: SeatId,
        now: Instant,
    ) -> Result<IndexMap<SeatId, Role>, AlreadyAssigned> {
        if self.phase != Phase::Waiting {
            return Err(AlreadyAssigned);
        }
        self.install_roles(deal_roles(seat_count), human_seat, now);
        Ok(self.seats.iter().map(|(id, seat)| (*id, seat.role)).collect())
    }

    /// Commit a fixed seat-order role list. Split out of [`Session::assign_roles`]
    /// so tests can build deterministic tables.
    pub(crate) fn install_roles(&mut self, roles: Vec<Role>, human_seat: SeatId, now: Instant) {
        for (idx, role) in roles.into_iter().enumerate() {
            let number = (idx + 1) as SeatId;
            let controller =
                if number == human_seat { Controller::Human } else { Controller::Agent };
            self.seats.insert(number, Seat { number, role, alive: true, controller });
        }
        self.human_seat = human_seat;
        self.round = 1;
        self.set_phase(Phase::RoleAssigned, Duration::ZERO, now);
        self.announce(
            AnnouncementKind::RolesAssigned,
            "Roles have been dealt. Check your role card, the first day is about to begin.",
        );
    }

    /// Conditionally advance to the next phase.
    ///
    /// The transition fires only when the current phase is complete (all
    /// speeches delivered, all votes in, night rotation finished, reveal
    /// elapsed) or its deadline has expired. Anything else, including calls
    /// from `waiting` and `game_over`, is a no-op that reports the current
    /// phase. That property is what makes racing pollers safe: the first
    /// call consumes the completed phase, the second observes a fresh,
    /// incomplete one.
    pub fn advance_phase(&mut self, timings: &PhaseTimings, now: Instant) -> PhaseAdvance {
        let due = self.phase_deadline.is_some_and(|deadline| now >= deadline);
        match self.phase {
            Phase::Waiting | Phase::GameOver => self.unchanged(),
            Phase::RoleAssigned => self.enter_day_discussion(timings, now),
            Phase::DayDiscussion if self.discussion_complete() || due => {
                self.enter_day_voting(timings, now)
            }
            Phase::DayVoting if self.voting_complete() || due => self.settle_votes(timings, now),
            Phase::DayResult if due => self.enter_night_action(timings, now),
            Phase::NightAction if self.night.current_role.is_none() || due => {
                self.settle_night(timings, now)
            }
            Phase::NightResult if due => self.enter_day_discussion(timings, now),
            _ => self.unchanged(),
        }
    }

    /// All speakers in the current order have had their turn.
    pub fn discussion_complete(&self) -> bool {
        self.current_speaker().is_none()
    }

    /// Every alive seat has a vote on record.
    pub fn voting_complete(&self) -> bool {
        self.alive_seats().iter().all(|seat| self.votes.contains_key(seat))
    }

    fn unchanged(&self) -> PhaseAdvance {
        PhaseAdvance { phase: self.phase, duration: self.phase_duration, changed: false }
    }

    fn changed(&self) -> PhaseAdvance {
        PhaseAdvance { phase: self.phase, duration: self.phase_duration, changed: true }
    }

    /// Move to `next`, bump the phase version, and arm the deadline.
    ///
    /// `role_assigned` (zero duration) and `game_over` carry no deadline:
    /// the former holds for an explicit advance, the latter is terminal.
    fn set_phase(&mut self, next: Phase, duration: Duration, now: Instant) {
        self.phase = next;
        self.phase_version += 1;
        self.phase_duration = duration;
        self.phase_deadline =
            (!duration.is_zero() && next != Phase::GameOver).then(|| now + duration);
        self.push_message(GameMessageBody::PhaseChange { phase: next, round: self.round });
    }

    fn enter_day_discussion(&mut self, timings: &PhaseTimings, now: Instant) -> PhaseAdvance {
        self.speaking_order = self.alive_seats();
        self.current_speaker_index = 0;
        self.votes.clear();
        self.set_phase(Phase::DayDiscussion, timings.discussion, now);
        self.changed()
    }

    fn enter_day_voting(&mut self, timings: &PhaseTimings, now: Instant) -> PhaseAdvance {
        self.votes.clear();
        self.set_phase(Phase::DayVoting, timings.voting, now);
        self.changed()
    }

    /// Tally the day vote and eliminate the plurality target.
    ///
    /// Ties resolve to the lowest seat number, so re-running an identical
    /// vote map always eliminates the same seat.
    fn settle_votes(&mut self, timings: &PhaseTimings, now: Instant) -> PhaseAdvance {
        self.last_dead = None;
        if let Some(victim) = plurality(&self.votes) {
            self.kill_seat(victim, KilledBy::Vote);
            self.announce(
                AnnouncementKind::Death,
                format!("Seat {victim} was voted out by the town."),
            );
        } else {
            self.announce(
                AnnouncementKind::Death,
                "The vote was inconclusive. Nobody was exiled.",
            );
        }

        if self.update_result() {
            return self.enter_game_over(now);
        }
        self.set_phase(Phase::DayResult, timings.result_reveal, now);
        self.changed()
    }

    fn enter_night_action(&mut self, timings: &PhaseTimings, now: Instant) -> PhaseAdvance {
        self.night = NightState::default();
        for role in NIGHT_ORDER {
            if self.alive_with_role(role).is_empty() {
                self.night.completed.push(role);
            }
        }
        self.night.current_role =
            NIGHT_ORDER.into_iter().find(|role| !self.night.completed.contains(role));
        self.set_phase(Phase::NightAction, timings.night, now);
        if let Some(role) = self.night.current_role {
            self.announce(AnnouncementKind::NightPrompt, night_prompt(role));
        }
        self.changed()
    }

    /// Apply the night's actions and reveal the outcome.
    ///
    /// The witch's save cancels the pack kill on the same seat. Poison
    /// never re-targets the kill seat, so a saved seat stays alive and a
    /// double-killed seat dies once. When both a pack kill and a poison
    /// land, the pack kill is the one reported.
    fn settle_night(&mut self, timings: &PhaseTimings, now: Instant) -> PhaseAdvance {
        let kill = self.night.pending_kill.or_else(|| plurality(&self.night.wolf_choices));
        let saved = self.night.saved;
        let poisoned = self.night.poisoned;

        self.last_dead = None;
        if let Some(victim) = kill {
            if saved != Some(victim) {
                self.kill_seat(victim, KilledBy::Werewolf);
            }
        }
        let wolf_death = self.last_dead;
        if let Some(victim) = poisoned {
            if kill != Some(victim) && self.is_alive(victim) {
                self.kill_seat(victim, KilledBy::Witch);
            }
        }
        if let Some(dead) = wolf_death {
            self.last_dead = Some(dead);
        }

        match self.last_dead {
            Some(dead) => self.announce(
                AnnouncementKind::Death,
                format!("Dawn breaks. Seat {} did not survive the night.", dead.seat),
            ),
            None => self.announce(
                AnnouncementKind::Death,
                "Dawn breaks on a peaceful night. Nobody died.",
            ),
        }

        if self.update_result() {
            return self.enter_game_over(now);
        }
        // One increment per full day/night cycle, nowhere else.
        self.round += 1;
        self.set_phase(Phase::NightResult, timings.result_reveal, now);
        self.changed()
    }

    fn enter_game_over(&mut self, now: Instant) -> PhaseAdvance {
        let winner = self.result;
        self.push_message(GameMessageBody::GameEnd { winner, round: self.round });
        self.set_phase(Phase::GameOver, Duration::ZERO, now);
        let text = match winner {
            GameResult::VillagerWin => "All werewolves are dead. The village wins.",
            GameResult::WerewolfWin => "The werewolves have overrun the village. The pack wins.",
            GameResult::Ongoing => "The game is over.",
        };
        self.announce(AnnouncementKind::GameOver, text);
        self.changed()
    }

    fn kill_seat(&mut self, victim: SeatId, killed_by: KilledBy) {
        let Some(role) = self.seat(victim).filter(|s| s.alive).map(|s| s.role) else {
            return;
        };
        if let Some(seat) = self.seats.get_mut(&victim) {
            seat.alive = false;
        }
        self.last_dead = Some(DeadPlayer { seat: victim, role, killed_by });
        self.push_message(GameMessageBody::PlayerDeath {
            seat: victim,
            role,
            killed_by,
            round: self.round,
        });
    }

    /// Re-evaluate the win condition, recording the result when one holds.
    fn update_result(&mut self) -> bool {
        let wolves = self.alive_with_role(Role::Werewolf).len();
        let others = self.alive_seats().len() - wolves;
        self.result = if wolves == 0 {
            GameResult::VillagerWin
        } else if wolves >= others {
            GameResult::WerewolfWin
        } else {
            GameResult::Ongoing
        };
        self.result != GameResult::Ongoing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::rotation::NightActionKind;

    const T: PhaseTimings = PhaseTimings {
        discussion: Duration::from_secs(120),
        voting: Duration::from_secs(20),
        night: Duration::from_secs(120),
        result_reveal: Duration::from_secs(5),
    };

    /// Six-seat table with a fixed deal: seat 1 werewolf, 2 seer, 3 witch,
    /// seats 4-6 villagers. Human on seat 4.
    fn table() -> (Session, Instant) {
        let mut session = Session::new("room-1");
        let now = Instant::now();
        session.install_roles(
            vec![
                Role::Werewolf,
                Role::Seer,
                Role::Witch,
                Role::Villager,
                Role::Villager,
                Role::Villager,
            ],
            4,
            now,
        );
        (session, now)
    }

    fn speak_everyone(session: &mut Session) {
        while let Some(seat) = session.current_speaker() {
            session.record_speech(seat, format!("seat {seat} talking")).unwrap();
            session.advance_speaker();
        }
    }

    #[test]
    fn assign_roles_is_single_shot() {
        let mut session = Session::new("room-1");
        let now = Instant::now();
        let mapping = session.assign_roles(12, 1, now).unwrap();
        assert_eq!(mapping.len(), 12);
        assert_eq!(session.phase, Phase::RoleAssigned);
        assert_eq!(session.round, 1);
        assert_eq!(session.assign_roles(12, 1, now), Err(AlreadyAssigned));
    }

    #[test]
    fn advance_is_a_noop_before_assignment_and_after_game_over() {
        let mut session = Session::new("room-1");
        let now = Instant::now();
        let adv = session.advance_phase(&T, now);
        assert_eq!((adv.phase, adv.changed), (Phase::Waiting, false));

        let (mut session, now) = table();
        session.phase = Phase::GameOver;
        let adv = session.advance_phase(&T, now);
        assert_eq!((adv.phase, adv.changed), (Phase::GameOver, false));
    }

    #[test]
    fn first_advance_enters_discussion_and_builds_order() {
        let (mut session, now) = table();
        let adv = session.advance_phase(&T, now);
        assert_eq!(adv.phase, Phase::DayDiscussion);
        assert_eq!(session.speaking_order, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(session.current_speaker_index, 0);
        assert!(session.votes.is_empty());
    }

    #[test]
    fn double_advance_within_a_phase_version_is_idempotent() {
        let (mut session, now) = table();
        let first = session.advance_phase(&T, now);
        let version = session.phase_version;
        // Nothing was submitted in between, so the second call must land on
        // the same phase and leave the version alone.
        let second = session.advance_phase(&T, now);
        assert_eq!(first.phase, second.phase);
        assert!(!second.changed);
        assert_eq!(session.phase_version, version);
    }

    #[test]
    fn discussion_ends_by_exhaustion_or_deadline() {
        let (mut session, now) = table();
        session.advance_phase(&T, now);

        // Not complete yet: advancing is a no-op.
        assert!(!session.advance_phase(&T, now).changed);

        speak_everyone(&mut session);
        assert!(session.discussion_complete());
        assert_eq!(session.advance_phase(&T, now).phase, Phase::DayVoting);

        // Deadline path: a silent table still moves on when time is up.
        let (mut session, now) = table();
        session.advance_phase(&T, now);
        let late = now + T.discussion + Duration::from_secs(1);
        assert_eq!(session.advance_phase(&T, late).phase, Phase::DayVoting);
    }

    #[test]
    fn vote_tie_breaks_to_the_lowest_seat() {
        let (mut session, now) = table();
        session.advance_phase(&T, now);
        speak_everyone(&mut session);
        session.advance_phase(&T, now);

        // 3 votes for seat 5, 3 votes for seat 6.
        for (voter, target) in [(1, 5), (2, 5), (3, 5), (4, 6), (5, 6), (6, 6)] {
            session.cast_vote(voter, target).unwrap();
        }
        let adv = session.advance_phase(&T, now);
        assert_eq!(adv.phase, Phase::DayResult);
        assert_eq!(
            session.last_dead,
            Some(DeadPlayer { seat: 5, role: Role::Villager, killed_by: KilledBy::Vote })
        );
        assert!(!session.is_alive(5));
    }

    #[test]
    fn voting_deadline_settles_partial_votes() {
        let (mut session, now) = table();
        session.advance_phase(&T, now);
        speak_everyone(&mut session);
        session.advance_phase(&T, now);

        session.cast_vote(1, 6).unwrap();
        assert!(!session.advance_phase(&T, now).changed);

        let late = now + T.voting + Duration::from_secs(1);
        assert_eq!(session.advance_phase(&T, late).phase, Phase::DayResult);
        assert_eq!(session.last_dead.map(|d| d.seat), Some(6));
    }

    #[test]
    fn witch_save_cancels_the_pack_kill() {
        let (mut session, now) = table();
        session.advance_phase(&T, now);
        speak_everyone(&mut session);
        session.advance_phase(&T, now);
        for voter in 1..=6 {
            session.cast_vote(voter, 6).unwrap();
        }
        session.advance_phase(&T, now);
        let after_reveal = now + T.result_reveal;
        session.advance_phase(&T, after_reveal);
        assert_eq!(session.phase, Phase::NightAction);

        session.submit_night_action(1, Role::Werewolf, NightActionKind::Kill, Some(4)).unwrap();
        session.submit_night_action(2, Role::Seer, NightActionKind::Check, Some(1)).unwrap();
        session.submit_night_action(3, Role::Witch, NightActionKind::Save, Some(4)).unwrap();

        let adv = session.advance_phase(&T, after_reveal);
        assert_eq!(adv.phase, Phase::NightResult);
        assert_eq!(session.last_dead, None);
        assert!(session.is_alive(4));
    }

    #[test]
    fn poison_kills_and_pack_kill_is_the_one_reported() {
        let (mut session, now) = table();
        session.phase = Phase::DayResult;
        session.phase_deadline = Some(now);
        session.advance_phase(&T, now);

        session.submit_night_action(1, Role::Werewolf, NightActionKind::Kill, Some(5)).unwrap();
        session.submit_night_action(2, Role::Seer, NightActionKind::Check, Some(3)).unwrap();
        session.submit_night_action(3, Role::Witch, NightActionKind::Poison, Some(6)).unwrap();

        session.advance_phase(&T, now);
        assert!(!session.is_alive(5));
        assert!(!session.is_alive(6));
        assert_eq!(
            session.last_dead,
            Some(DeadPlayer { seat: 5, role: Role::Villager, killed_by: KilledBy::Werewolf })
        );
    }

    #[test]
    fn round_increments_once_per_cycle() {
        let (mut session, now) = table();
        assert_eq!(session.round, 1);
        session.advance_phase(&T, now);
        speak_everyone(&mut session);
        session.advance_phase(&T, now);
        assert_eq!(session.round, 1);

        for voter in 1..=6 {
            session.cast_vote(voter, 6).unwrap();
        }
        session.advance_phase(&T, now);
        assert_eq!(session.round, 1);

        let later = now + T.result_reveal;
        session.advance_phase(&T, later);
        let night_end = later + T.night + Duration::from_secs(1);
        session.advance_phase(&T, night_end);
        assert_eq!(session.phase, Phase::NightResult);
        assert_eq!(session.round, 2);
    }

    #[test]
    fn killing_the_last_werewolf_ends_the_game() {
        let (mut session, now) = table();
        session.advance_phase(&T, now);
        speak_everyone(&mut session);
        session.advance_phase(&T, now);
        for voter in 1..=6 {
            session.cast_vote(voter, 1).unwrap();
        }
        let adv = session.advance_phase(&T, now);
        assert_eq!(adv.phase, Phase::GameOver);
        assert_eq!(session.result, GameResult::VillagerWin);
        // Terminal: further advances change nothing.
        assert!(!session.advance_phase(&T, now).changed);
    }

    #[test]
    fn wolf_parity_ends_the_game() {
        let (mut session, _now) = table();
        for seat in [2, 3, 4, 5] {
            session.kill_seat(seat, KilledBy::Vote);
        }
        // One wolf, one villager left.
        assert!(session.update_result());
        assert_eq!(session.result, GameResult::WerewolfWin);
    }
}
