//! Mode policies: the closed set of rules that differ between solo, scrum and team play.
//!
//! A policy is selected once per session with [`policy_for`] and handed down to the
//! services, which never branch on the mode themselves.

use std::time::Duration;

use crate::{
    config::TimingConfig,
    dao::models::GameMode,
    error::Rejection,
    state::game::Difficulty,
};

/// Live roster counts read right before evaluating a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RosterCounts {
    /// Players across every team.
    pub participants: u32,
    /// Teams holding at least one player.
    pub teams_with_players: u32,
}

/// What a freshly recorded answer looks like from the round's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Whether the recorded answer was right.
    pub is_correct: bool,
    /// Distinct answerers for the question, including this one.
    pub answered: u32,
    /// Players in the session when the answer was recorded.
    pub participants: u32,
}

/// How players enter a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRule {
    /// The session belongs to its creator alone.
    Closed,
    /// Every player gets a singleton team, up to the session quota.
    SoloSlot,
    /// Players pick one of the teams declared at creation.
    ChooseTeam,
}

/// Shape of the final ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingKind {
    /// Correct answers recorded for the session itself.
    Session,
    /// Flat list of players.
    Players,
    /// Team name to totals and averages.
    Teams,
}

/// Rules a game mode applies to the shared engine.
pub trait ModePolicy: Send + Sync {
    /// Mode this policy drives.
    fn mode(&self) -> GameMode;

    /// Solo sessions enter `started` as soon as they are created.
    fn starts_on_creation(&self) -> bool {
        false
    }

    /// How players enter sessions of this mode.
    fn join_rule(&self) -> JoinRule;

    /// Check the live roster before leaving `pending`.
    fn start_precondition(
        &self,
        roster: RosterCounts,
        max_players: Option<u32>,
    ) -> Result<(), Rejection>;

    /// Whether this answer closes the round right away.
    fn resolve_trigger(&self, outcome: SubmissionOutcome) -> bool;

    /// Time allotted to each question, `None` for untimed play.
    fn duration(&self, difficulty: Option<&str>, timing: &TimingConfig) -> Option<Duration>;

    /// Pause between a reveal and the next question.
    fn reveal_window(&self, timing: &TimingConfig) -> Duration {
        timing.reveal_window
    }

    /// Shape of the standings.
    fn ranking(&self) -> RankingKind;

    /// Answers are keyed by player rather than by session.
    fn is_multiplayer(&self) -> bool {
        self.ranking() != RankingKind::Session
    }
}

/// Solo play without a countdown.
pub struct SoloUntimedPolicy;
/// Solo play racing a per-difficulty countdown.
pub struct SoloTimedPolicy;
/// Individual players on one question stream.
pub struct ScrumPolicy;
/// Teams that always play the full duration.
pub struct TeamPolicy;

impl ModePolicy for SoloUntimedPolicy {
    fn mode(&self) -> GameMode {
        GameMode::SoloUntimed
    }

    fn starts_on_creation(&self) -> bool {
        true
    }

    fn join_rule(&self) -> JoinRule {
        JoinRule::Closed
    }

    fn start_precondition(&self, _: RosterCounts, _: Option<u32>) -> Result<(), Rejection> {
        Ok(())
    }

    fn resolve_trigger(&self, _: SubmissionOutcome) -> bool {
        true
    }

    fn duration(&self, _: Option<&str>, _: &TimingConfig) -> Option<Duration> {
        None
    }

    // The solo client renders the reveal from the answer response.
    fn reveal_window(&self, _: &TimingConfig) -> Duration {
        Duration::ZERO
    }

    fn ranking(&self) -> RankingKind {
        RankingKind::Session
    }
}

impl ModePolicy for SoloTimedPolicy {
    fn mode(&self) -> GameMode {
        GameMode::SoloTimed
    }

    fn starts_on_creation(&self) -> bool {
        true
    }

    fn join_rule(&self) -> JoinRule {
        JoinRule::Closed
    }

    fn start_precondition(&self, _: RosterCounts, _: Option<u32>) -> Result<(), Rejection> {
        Ok(())
    }

    fn resolve_trigger(&self, _: SubmissionOutcome) -> bool {
        true
    }

    fn duration(&self, difficulty: Option<&str>, timing: &TimingConfig) -> Option<Duration> {
        Some(tiered_duration(difficulty, timing))
    }

    fn reveal_window(&self, _: &TimingConfig) -> Duration {
        Duration::ZERO
    }

    fn ranking(&self) -> RankingKind {
        RankingKind::Session
    }
}

impl ModePolicy for ScrumPolicy {
    fn mode(&self) -> GameMode {
        GameMode::Scrum
    }

    fn join_rule(&self) -> JoinRule {
        JoinRule::SoloSlot
    }

    fn start_precondition(
        &self,
        roster: RosterCounts,
        max_players: Option<u32>,
    ) -> Result<(), Rejection> {
        let required = max_players.unwrap_or_default();
        if roster.participants == required {
            Ok(())
        } else {
            Err(Rejection::QuotaNotReached {
                current: roster.participants,
                required,
            })
        }
    }

    fn resolve_trigger(&self, outcome: SubmissionOutcome) -> bool {
        outcome.is_correct || outcome.answered >= outcome.participants
    }

    fn duration(&self, _: Option<&str>, timing: &TimingConfig) -> Option<Duration> {
        Some(timing.scrum_question)
    }

    fn ranking(&self) -> RankingKind {
        RankingKind::Players
    }
}

impl ModePolicy for TeamPolicy {
    fn mode(&self) -> GameMode {
        GameMode::Team
    }

    fn join_rule(&self) -> JoinRule {
        JoinRule::ChooseTeam
    }

    fn start_precondition(&self, roster: RosterCounts, _: Option<u32>) -> Result<(), Rejection> {
        if roster.teams_with_players >= 2 {
            Ok(())
        } else {
            Err(Rejection::NotEnoughTeams {
                ready: roster.teams_with_players,
            })
        }
    }

    fn resolve_trigger(&self, _: SubmissionOutcome) -> bool {
        false
    }

    fn duration(&self, difficulty: Option<&str>, timing: &TimingConfig) -> Option<Duration> {
        Some(tiered_duration(difficulty, timing))
    }

    fn ranking(&self) -> RankingKind {
        RankingKind::Teams
    }
}

fn tiered_duration(difficulty: Option<&str>, timing: &TimingConfig) -> Duration {
    let tier = difficulty.map_or(Difficulty::Easy, Difficulty::from_label);
    timing.for_difficulty(tier)
}

/// Policy governing sessions of `mode`.
pub fn policy_for(mode: GameMode) -> &'static dyn ModePolicy {
    match mode {
        GameMode::SoloUntimed => &SoloUntimedPolicy,
        GameMode::SoloTimed => &SoloTimedPolicy,
        GameMode::Scrum => &ScrumPolicy,
        GameMode::Team => &TeamPolicy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(is_correct: bool, answered: u32, participants: u32) -> SubmissionOutcome {
        SubmissionOutcome {
            is_correct,
            answered,
            participants,
        }
    }

    #[test]
    fn every_mode_maps_to_its_own_policy() {
        for mode in [
            GameMode::SoloUntimed,
            GameMode::SoloTimed,
            GameMode::Scrum,
            GameMode::Team,
        ] {
            assert_eq!(policy_for(mode).mode(), mode);
        }
    }

    #[test]
    fn scrum_resolves_on_correct_or_everyone_answered() {
        let scrum = policy_for(GameMode::Scrum);
        assert!(scrum.resolve_trigger(outcome(true, 1, 3)));
        assert!(!scrum.resolve_trigger(outcome(false, 2, 3)));
        assert!(scrum.resolve_trigger(outcome(false, 3, 3)));
    }

    #[test]
    fn team_rounds_only_end_on_the_timer() {
        let team = policy_for(GameMode::Team);
        assert!(!team.resolve_trigger(outcome(true, 4, 4)));
    }

    #[test]
    fn solo_rounds_end_on_any_answer() {
        for mode in [GameMode::SoloUntimed, GameMode::SoloTimed] {
            assert!(policy_for(mode).resolve_trigger(outcome(false, 1, 1)));
        }
    }

    #[test]
    fn scrum_quota_reports_counts() {
        let scrum = policy_for(GameMode::Scrum);
        let roster = RosterCounts {
            participants: 2,
            teams_with_players: 2,
        };
        assert_eq!(
            scrum.start_precondition(roster, Some(3)),
            Err(Rejection::QuotaNotReached {
                current: 2,
                required: 3
            })
        );
        let full = RosterCounts {
            participants: 3,
            teams_with_players: 3,
        };
        assert_eq!(scrum.start_precondition(full, Some(3)), Ok(()));
    }

    #[test]
    fn team_needs_two_populated_teams() {
        let team = policy_for(GameMode::Team);
        let one = RosterCounts {
            participants: 5,
            teams_with_players: 1,
        };
        assert_eq!(
            team.start_precondition(one, None),
            Err(Rejection::NotEnoughTeams { ready: 1 })
        );
        let two = RosterCounts {
            participants: 2,
            teams_with_players: 2,
        };
        assert!(team.start_precondition(two, None).is_ok());
    }

    #[test]
    fn durations_follow_the_timing_table() {
        let timing = TimingConfig::default();
        assert_eq!(policy_for(GameMode::SoloUntimed).duration(None, &timing), None);
        assert_eq!(
            policy_for(GameMode::Scrum).duration(Some("hard"), &timing),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            policy_for(GameMode::Team).duration(Some("medium"), &timing),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            policy_for(GameMode::SoloTimed).duration(Some("unheard-of"), &timing),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn only_solo_skips_the_reveal_pause() {
        let timing = TimingConfig::default();
        assert_eq!(
            policy_for(GameMode::SoloTimed).reveal_window(&timing),
            Duration::ZERO
        );
        assert_eq!(
            policy_for(GameMode::Team).reveal_window(&timing),
            timing.reveal_window
        );
        assert!(!policy_for(GameMode::SoloUntimed).is_multiplayer());
        assert!(policy_for(GameMode::Scrum).is_multiplayer());
    }
}
