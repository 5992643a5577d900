//! Turn rotation: who may act, in which order, during each phase.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::roles::{Role, SeatId};
use crate::state::session::{AnnouncementKind, SeerCheck, Session, SpeechRecord};
use crate::state::state_machine::Phase;

/// Fixed night acting order. The witch goes last so she can see the pack's
/// pending kill before deciding on her potions.
pub const NIGHT_ORDER: [Role; 3] = [Role::Werewolf, Role::Seer, Role::Witch];

/// Hard cap on a single speech submission.
pub const MAX_SPEECH_CHARS: usize = 300;

/// Night actions a role can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NightActionKind {
    /// Werewolf kill choice.
    Kill,
    /// Seer role check.
    Check,
    /// Witch save potion (no target means decline).
    Save,
    /// Witch poison potion (no target means decline).
    Poison,
}

/// Rejections for out-of-turn or malformed submissions. None of these
/// mutate the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TurnError {
    /// The submission does not belong to the current phase.
    #[error("action not allowed during {0:?}")]
    WrongPhase(Phase),
    /// The acting seat does not exist or is dead.
    #[error("seat {0} does not exist or is dead")]
    InvalidSeat(SeatId),
    /// The voting seat does not exist or is dead.
    #[error("voter seat {0} is dead or unknown")]
    DeadVoter(SeatId),
    /// The targeted seat does not exist or is dead.
    #[error("target seat {0} is dead or unknown")]
    InvalidTarget(SeatId),
    /// The submitting role is not the one currently acting.
    #[error("not the {submitted:?}'s turn (currently acting: {current:?})")]
    NotYourTurn {
        /// Role the submission claimed.
        submitted: Role,
        /// Role whose turn it actually is.
        current: Option<Role>,
    },
    /// Speech text over the per-submission cap.
    #[error("speech exceeds {MAX_SPEECH_CHARS} characters")]
    SpeechTooLong,
    /// The witch already spent that potion earlier in the game.
    #[error("the witch has already spent that potion")]
    PotionSpent,
    /// The action does not belong to the submitting role.
    #[error("{role:?} cannot perform {action:?}")]
    UnsupportedAction {
        /// Role that submitted.
        role: Role,
        /// Action it asked for.
        action: NightActionKind,
    },
    /// The action needs a target seat and none was given.
    #[error("{0:?} requires a target seat")]
    MissingTarget(NightActionKind),
}

/// Plurality winner of a voter-to-target map, ties broken by the lowest
/// target seat number. `None` when nobody voted.
pub fn plurality(votes: &IndexMap<SeatId, SeatId>) -> Option<SeatId> {
    let mut counts: IndexMap<SeatId, u32> = IndexMap::new();
    for target in votes.values() {
        *counts.entry(*target).or_insert(0) += 1;
    }
    let top = counts.values().copied().max()?;
    counts.iter().filter(|(_, count)| **count == top).map(|(seat, _)| *seat).min()
}

/// Narrator line shown when a night role's turn opens.
pub fn night_prompt(role: Role) -> &'static str {
    match role {
        Role::Werewolf => "Night falls. Werewolves, open your eyes and choose a victim.",
        Role::Seer => "Seer, open your eyes and choose a seat to check.",
        Role::Witch => "Witch, open your eyes. Will you use a potion tonight?",
        Role::Villager | Role::Hunter => "The village sleeps.",
    }
}

impl Session {
    /// The seat whose turn it is to speak.
    ///
    /// Scans forward from the cursor so a seat that died mid-discussion is
    /// skipped without touching the recorded order. Returns `None` once the
    /// order is exhausted; there is no out-of-range seat to hand out.
    pub fn current_speaker(&self) -> Option<SeatId> {
        self.speaking_order
            .get(self.current_speaker_index..)?
            .iter()
            .copied()
            .find(|seat| self.is_alive(*seat))
    }

    /// Record one speech. Human and agent text flows through here alike so
    /// the history stays uniform.
    pub fn record_speech(&mut self, seat: SeatId, text: String) -> Result<(), TurnError> {
        if self.phase != Phase::DayDiscussion {
            return Err(TurnError::WrongPhase(self.phase));
        }
        if !self.is_alive(seat) {
            return Err(TurnError::InvalidSeat(seat));
        }
        if text.chars().count() > MAX_SPEECH_CHARS {
            return Err(TurnError::SpeechTooLong);
        }
        self.speeches.push(SpeechRecord {
            id: uuid::Uuid::new_v4(),
            seat,
            round: self.round,
            text,
            at: std::time::SystemTime::now(),
        });
        Ok(())
    }

    /// Move the cursor past the current speaker and return the next one.
    /// `None` means the order is exhausted and the discussion should end.
    pub fn advance_speaker(&mut self) -> Option<SeatId> {
        match self.current_speaker() {
            Some(current) => {
                let offset = self.speaking_order[self.current_speaker_index..]
                    .iter()
                    .position(|seat| *seat == current)
                    .unwrap_or(0);
                self.current_speaker_index += offset + 1;
            }
            None => self.current_speaker_index = self.speaking_order.len(),
        }
        self.current_speaker()
    }

    /// Cast (or re-cast) a vote. A later vote from the same seat overwrites
    /// the earlier one.
    pub fn cast_vote(&mut self, voter: SeatId, target: SeatId) -> Result<(), TurnError> {
        if self.phase != Phase::DayVoting {
            return Err(TurnError::WrongPhase(self.phase));
        }
        if !self.is_alive(voter) {
            return Err(TurnError::DeadVoter(voter));
        }
        if !self.is_alive(target) {
            return Err(TurnError::InvalidTarget(target));
        }
        self.votes.insert(voter, target);
        Ok(())
    }

    /// Submit one night action for the currently acting role.
    ///
    /// The werewolf turn completes once every living werewolf has lodged a
    /// kill choice; the pack victim is the plurality of those choices with
    /// ties broken by the lowest seat. Seer and witch complete on a single
    /// submission. A declined potion (no target) completes the witch's turn
    /// without spending anything.
    pub fn submit_night_action(
        &mut self,
        seat: SeatId,
        role: Role,
        action: NightActionKind,
        target: Option<SeatId>,
    ) -> Result<(), TurnError> {
        if self.phase != Phase::NightAction {
            return Err(TurnError::WrongPhase(self.phase));
        }
        let Some(actor) = self.seat(seat).filter(|s| s.alive) else {
            return Err(TurnError::InvalidSeat(seat));
        };
        if actor.role != role {
            return Err(TurnError::NotYourTurn { submitted: role, current: self.night.current_role });
        }
        if self.night.current_role != Some(role) {
            return Err(TurnError::NotYourTurn { submitted: role, current: self.night.current_role });
        }

        match (role, action) {
            (Role::Werewolf, NightActionKind::Kill) => {
                let victim = target.ok_or(TurnError::MissingTarget(action))?;
                if !self.is_alive(victim) {
                    return Err(TurnError::InvalidTarget(victim));
                }
                self.night.wolf_choices.insert(seat, victim);
                let wolves = self.alive_with_role(Role::Werewolf);
                if wolves.iter().all(|wolf| self.night.wolf_choices.contains_key(wolf)) {
                    self.night.pending_kill = plurality(&self.night.wolf_choices);
                    self.complete_night_role(Role::Werewolf);
                }
            }
            (Role::Seer, NightActionKind::Check) => {
                let subject = target.ok_or(TurnError::MissingTarget(action))?;
                let Some(revealed) = self.seat(subject).filter(|s| s.alive).map(|s| s.role) else {
                    return Err(TurnError::InvalidTarget(subject));
                };
                self.night.checked = Some(subject);
                let round = self.round;
                self.seer_checks.push(SeerCheck { round, seat: subject, role: revealed });
                self.complete_night_role(Role::Seer);
            }
            (Role::Witch, NightActionKind::Save) => {
                if let Some(saved) = target {
                    if !self.witch.save {
                        return Err(TurnError::PotionSpent);
                    }
                    if !self.is_alive(saved) {
                        return Err(TurnError::InvalidTarget(saved));
                    }
                    self.night.saved = Some(saved);
                    self.witch.save = false;
                }
                self.complete_night_role(Role::Witch);
            }
            (Role::Witch, NightActionKind::Poison) => {
                if let Some(poisoned) = target {
                    if !self.witch.poison {
                        return Err(TurnError::PotionSpent);
                    }
                    if !self.is_alive(poisoned) {
                        return Err(TurnError::InvalidTarget(poisoned));
                    }
                    self.night.poisoned = Some(poisoned);
                    self.witch.poison = false;
                }
                self.complete_night_role(Role::Witch);
            }
            (role, action) => return Err(TurnError::UnsupportedAction { role, action }),
        }
        Ok(())
    }

    /// Seats of the currently acting role that already submitted tonight.
    pub fn night_acted_seats(&self) -> Vec<SeatId> {
        match self.night.current_role {
            Some(Role::Werewolf) => self.night.wolf_choices.keys().copied().collect(),
            _ => Vec::new(),
        }
    }

    fn complete_night_role(&mut self, role: Role) {
        if !self.night.completed.contains(&role) {
            self.night.completed.push(role);
        }
        self.night.current_role = NIGHT_ORDER.into_iter().find(|candidate| {
            !self.night.completed.contains(candidate)
                && !self.alive_with_role(*candidate).is_empty()
        });
        if let Some(next) = self.night.current_role {
            self.announce(AnnouncementKind::NightPrompt, night_prompt(next));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::state::state_machine::PhaseTimings;

    fn discussion_table() -> Session {
        let mut session = Session::new("room-1");
        let now = Instant::now();
        session.install_roles(
            vec![Role::Werewolf, Role::Werewolf, Role::Seer, Role::Witch, Role::Villager],
            5,
            now,
        );
        session.advance_phase(&PhaseTimings::default(), now);
        session
    }

    fn night_table() -> Session {
        let mut session = discussion_table();
        session.phase = Phase::DayResult;
        let now = Instant::now();
        session.phase_deadline = Some(now);
        session.advance_phase(&PhaseTimings::default(), now);
        assert_eq!(session.phase, Phase::NightAction);
        session
    }

    #[test]
    fn speaking_order_exhausts_without_out_of_range_seats() {
        let mut session = discussion_table();
        session.speaking_order = vec![1, 2, 3];
        assert_eq!(session.current_speaker(), Some(1));
        assert_eq!(session.advance_speaker(), Some(2));
        assert_eq!(session.advance_speaker(), Some(3));
        assert_eq!(session.advance_speaker(), None);
        // The fourth access fails closed.
        assert_eq!(session.current_speaker(), None);
        assert!(session.discussion_complete());
    }

    #[test]
    fn dead_seat_is_skipped_not_removed() {
        let mut session = discussion_table();
        assert_eq!(session.current_speaker(), Some(1));
        session.advance_speaker();
        if let Some(seat) = session.seats.get_mut(&3) {
            seat.alive = false;
        }
        // Seat 2 speaks, then the cursor jumps over dead seat 3.
        assert_eq!(session.current_speaker(), Some(2));
        assert_eq!(session.advance_speaker(), Some(4));
        assert_eq!(session.speaking_order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn speech_cap_and_dead_speakers_are_rejected() {
        let mut session = discussion_table();
        let long = "x".repeat(MAX_SPEECH_CHARS + 1);
        assert_eq!(session.record_speech(1, long), Err(TurnError::SpeechTooLong));
        if let Some(seat) = session.seats.get_mut(&2) {
            seat.alive = false;
        }
        assert_eq!(session.record_speech(2, "hello".into()), Err(TurnError::InvalidSeat(2)));
        assert!(session.record_speech(1, "hello".into()).is_ok());
        assert_eq!(session.speeches.len(), 1);
    }

    #[test]
    fn votes_are_last_write_wins() {
        let mut session = discussion_table();
        session.phase = Phase::DayVoting;
        session.cast_vote(1, 4).unwrap();
        session.cast_vote(1, 5).unwrap();
        assert_eq!(session.votes.get(&1), Some(&5));
        assert_eq!(session.votes.len(), 1);
    }

    #[test]
    fn invalid_vote_targets_and_dead_voters_are_rejected() {
        let mut session = discussion_table();
        session.phase = Phase::DayVoting;
        assert_eq!(session.cast_vote(1, 9), Err(TurnError::InvalidTarget(9)));
        if let Some(seat) = session.seats.get_mut(&4) {
            seat.alive = false;
        }
        assert_eq!(session.cast_vote(1, 4), Err(TurnError::InvalidTarget(4)));
        assert_eq!(session.cast_vote(4, 1), Err(TurnError::DeadVoter(4)));
        assert_eq!(session.cast_vote(9, 1), Err(TurnError::DeadVoter(9)));
    }

    #[test]
    fn night_rotation_enforces_the_role_order() {
        let mut session = night_table();
        assert_eq!(session.night.current_role, Some(Role::Werewolf));

        // The witch may not jump the queue.
        assert_eq!(
            session.submit_night_action(4, Role::Witch, NightActionKind::Poison, Some(1)),
            Err(TurnError::NotYourTurn { submitted: Role::Witch, current: Some(Role::Werewolf) })
        );

        // Both wolves must choose before the turn completes.
        session.submit_night_action(1, Role::Werewolf, NightActionKind::Kill, Some(5)).unwrap();
        assert_eq!(session.night.current_role, Some(Role::Werewolf));
        assert_eq!(session.night_acted_seats(), vec![1]);
        session.submit_night_action(2, Role::Werewolf, NightActionKind::Kill, Some(4)).unwrap();

        // Tie between seats 5 and 4 resolves to the lowest seat.
        assert_eq!(session.night.pending_kill, Some(4));
        assert_eq!(session.night.current_role, Some(Role::Seer));

        session.submit_night_action(3, Role::Seer, NightActionKind::Check, Some(1)).unwrap();
        assert_eq!(session.night.current_role, Some(Role::Witch));
        assert_eq!(session.seer_checks.last().map(|c| c.role), Some(Role::Werewolf));

        session.submit_night_action(4, Role::Witch, NightActionKind::Save, None).unwrap();
        assert_eq!(session.night.current_role, None);
        // Declining did not burn the potion.
        assert!(session.witch.save);
    }

    #[test]
    fn role_mismatch_is_not_your_turn() {
        let mut session = night_table();
        assert!(matches!(
            session.submit_night_action(5, Role::Werewolf, NightActionKind::Kill, Some(1)),
            Err(TurnError::NotYourTurn { .. })
        ));
    }

    #[test]
    fn extinct_roles_are_skipped_automatically() {
        let mut session = discussion_table();
        if let Some(seat) = session.seats.get_mut(&3) {
            seat.alive = false; // seer gone
        }
        session.phase = Phase::DayResult;
        let now = Instant::now();
        session.phase_deadline = Some(now);
        session.advance_phase(&PhaseTimings::default(), now);

        session.submit_night_action(1, Role::Werewolf, NightActionKind::Kill, Some(5)).unwrap();
        session.submit_night_action(2, Role::Werewolf, NightActionKind::Kill, Some(5)).unwrap();
        // Straight to the witch, no seer stop.
        assert_eq!(session.night.current_role, Some(Role::Witch));
    }

    #[test]
    fn spent_potions_are_rejected() {
        let mut session = night_table();
        session.witch.save = false;
        session.night.current_role = Some(Role::Witch);
        assert_eq!(
            session.submit_night_action(4, Role::Witch, NightActionKind::Save, Some(1)),
            Err(TurnError::PotionSpent)
        );
        // Declining is still fine with everything spent.
        session.witch.poison = false;
        assert!(session.submit_night_action(4, Role::Witch, NightActionKind::Poison, None).is_ok());
    }

    #[test]
    fn plurality_prefers_lowest_seat_on_ties() {
        let mut votes = IndexMap::new();
        assert_eq!(plurality(&votes), None);
        votes.insert(1, 6);
        votes.insert(2, 3);
        votes.insert(4, 3);
        assert_eq!(plurality(&votes), Some(3));
        votes.insert(5, 6);
        // 2 votes for 6, 2 votes for 3: lowest target wins.
        assert_eq!(plurality(&votes), Some(3));
    }
}
