//! Read-side scoring over persisted answers.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    dao::{
        models::{AnswerEntity, SessionEntity, TeamEntity},
        session_store::SessionStore,
        storage::saturating_count,
    },
    dto::events::{PlayerScore, Ranking, SoloScore, TeamScore},
    error::ServiceError,
    state::mode::{RankingKind, policy_for},
};

/// Correct answers per player id. Solo answers carry no player and are skipped.
pub fn correct_counts(answers: &[AnswerEntity]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for answer in answers {
        if let Some(player_id) = answer.player_id() {
            let entry = counts.entry(player_id).or_insert(0);
            if answer.is_correct {
                *entry += 1;
            }
        }
    }
    counts
}

/// Correct answers recorded for one player, or for the session itself when `player_id` is `None`.
pub fn correct_answers_of(answers: &[AnswerEntity], player_id: Option<&str>) -> u32 {
    let count = answers
        .iter()
        .filter(|answer| answer.is_correct && answer.player_id() == player_id)
        .count();
    saturating_count(count)
}

/// Correct answers of a solo session.
pub fn solo_ranking(answers: &[AnswerEntity]) -> Ranking {
    Ranking::Solo(SoloScore {
        correct_answers_nb: correct_answers_of(answers, None),
    })
}

/// Flat ranking of every rostered player, highest score first.
///
/// Roster members who never answered score zero. Ties keep roster order.
pub fn player_ranking(teams: &[TeamEntity], answers: &[AnswerEntity]) -> Ranking {
    let counts = correct_counts(answers);
    let mut scores: Vec<PlayerScore> = teams
        .iter()
        .flat_map(|team| team.members.iter())
        .map(|member| PlayerScore {
            username: member.username.clone(),
            score: counts
                .get(member.player_id.as_str())
                .copied()
                .unwrap_or_default(),
        })
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    Ranking::Players(scores)
}

/// Team totals and averages over current members, best total first.
pub fn team_ranking(teams: &[TeamEntity], answers: &[AnswerEntity]) -> Ranking {
    let counts = correct_counts(answers);
    let mut scored: Vec<(String, TeamScore)> = teams
        .iter()
        .map(|team| {
            let members: Vec<PlayerScore> = team
                .members
                .iter()
                .map(|member| PlayerScore {
                    username: member.username.clone(),
                    score: counts
                        .get(member.player_id.as_str())
                        .copied()
                        .unwrap_or_default(),
                })
                .collect();
            let total_score: u32 = members.iter().map(|member| member.score).sum();
            let average_score = if members.is_empty() {
                0.0
            } else {
                f64::from(total_score) / members.len() as f64
            };
            (
                team.name.clone(),
                TeamScore {
                    average_score,
                    total_score,
                    members,
                },
            )
        })
        .collect();
    scored.sort_by(|(_, a), (_, b)| b.total_score.cmp(&a.total_score));
    Ranking::Teams(scored.into_iter().collect::<IndexMap<_, _>>())
}

/// Ranking of a session in the shape its mode calls for.
pub async fn compute_ranking(
    store: &dyn SessionStore,
    session: &SessionEntity,
) -> Result<Ranking, ServiceError> {
    let answers = store.list_answers(session.id.clone()).await?;
    let ranking = match policy_for(session.mode).ranking() {
        RankingKind::Session => solo_ranking(&answers),
        RankingKind::Players => {
            let teams = store.list_teams(session.id.clone()).await?;
            player_ranking(&teams, &answers)
        }
        RankingKind::Teams => {
            let teams = store.list_teams(session.id.clone()).await?;
            team_ranking(&teams, &answers)
        }
    };
    Ok(ranking)
}
