//! Session lifecycle: creation, joins, team switches, departures and start.
//!
//! Every roster change is checked against the session's mode policy and pushed to the room
//! once written.

use tracing::{debug, info, warn};

use crate::{
    config::TimingConfig,
    dao::{
        models::{SessionEntity, SessionGuard, SessionPatch, SessionStatus, TeamEntity},
        session_store::SessionStore,
    },
    dto::{
        events::Ranking,
        session::{InitSessionRequest, SessionSummary},
    },
    error::{Rejection, ServiceError},
    services::{
        access::{authorize_participant, load_session, require_player},
        ranking_service::compute_ranking,
        room_events::{
            EVENT_PLAYER_JOINED, EVENT_PLAYER_LEFT, EVENT_TEAM_SWITCH, push_game_started,
            push_roster,
        },
        round_service::dispatch_round,
    },
    state::{
        ClientConnection, SharedState,
        game::{Player, generate_session_code},
        lifecycle::{SessionEvent, next_status},
        mode::{JoinRule, ModePolicy, RosterCounts, policy_for},
    },
};

const MAX_CODE_ATTEMPTS: usize = 16;

/// Create a session, its teams, and for solo play its first round.
pub async fn init_session(
    state: &SharedState,
    creator: Option<&Player>,
    request: InitSessionRequest,
) -> Result<SessionSummary, ServiceError> {
    let store = state.require_store().await?;
    let policy = policy_for(request.mode);
    let difficulty = request
        .difficulty_level
        .as_deref()
        .map(str::trim)
        .map(str::to_ascii_lowercase);
    let team_names = check_init_request(
        policy,
        creator,
        &request,
        difficulty.as_deref(),
        state.config().timing(),
    )?;

    let total = store.count_questions(request.quiz_id).await?;
    if total == 0 {
        return Err(ServiceError::NotFound(
            "Quiz not found or has no questions".into(),
        ));
    }

    let status = if policy.starts_on_creation() {
        next_status(SessionStatus::Pending, SessionEvent::Start)?
    } else {
        SessionStatus::Pending
    };
    let now = state.now();
    let mut session = SessionEntity {
        id: generate_session_code(),
        quiz_id: request.quiz_id,
        owner_id: creator.map(|player| player.id.clone()),
        mode: request.mode,
        status,
        current_question_index: 0,
        question_start_time: None,
        difficulty,
        max_players: request.max_players.filter(|_| policy.join_rule() == JoinRule::SoloSlot),
        created_at: now,
        updated_at: now,
    };
    create_with_fresh_code(store.as_ref(), &mut session).await?;

    let mut teams = Vec::new();
    match policy.join_rule() {
        JoinRule::Closed => {}
        JoinRule::SoloSlot => {
            if let Some(creator) = creator {
                let team = TeamEntity::new(session.id.clone(), creator.username.clone());
                store.create_team(team.clone()).await?;
                store.add_member(team.id, creator.as_member()).await?;
                teams.push(team);
            }
        }
        JoinRule::ChooseTeam => {
            for name in team_names {
                let team = TeamEntity::new(session.id.clone(), name);
                store.create_team(team.clone()).await?;
                teams.push(team);
            }
        }
    }

    info!(session_id = %session.id, mode = %session.mode, total, "session created");

    if session.status == SessionStatus::Started {
        dispatch_round(state, &session.id).await?;
        session = load_session(store.as_ref(), &session.id).await?;
    }
    let teams = store.list_teams(session.id.clone()).await?;
    Ok(SessionSummary::new(&session, total, &teams))
}

fn check_init_request(
    policy: &dyn ModePolicy,
    creator: Option<&Player>,
    request: &InitSessionRequest,
    difficulty: Option<&str>,
    timing: &TimingConfig,
) -> Result<Vec<String>, ServiceError> {
    if policy.is_multiplayer() {
        require_player(creator, "create a Scrum/Team game")?;
    }
    // Scrum has one fixed duration; every other timed mode is tiered.
    let needs_difficulty =
        policy.duration(None, timing).is_some() && policy.join_rule() != JoinRule::SoloSlot;
    if needs_difficulty && difficulty.is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "difficulty_level is required for {} mode",
            policy.mode()
        )));
    }

    match policy.join_rule() {
        JoinRule::SoloSlot if request.max_players.is_none() => Err(ServiceError::InvalidInput(
            format!("max_players is required for {} mode", policy.mode()),
        )),
        JoinRule::ChooseTeam => {
            let names: Vec<String> = request
                .teams
                .iter()
                .map(|name| name.trim().to_owned())
                .collect();
            if names.len() < 2 {
                return Err(ServiceError::InvalidInput(
                    "At least two team names are required for team mode".into(),
                ));
            }
            Ok(names)
        }
        _ => Ok(Vec::new()),
    }
}

async fn create_with_fresh_code(
    store: &dyn SessionStore,
    session: &mut SessionEntity,
) -> Result<(), ServiceError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        if store.get_session(session.id.clone()).await?.is_none() {
            match store.create_session(session.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => match ServiceError::from(err) {
                    ServiceError::Conflict(_) => {}
                    other => return Err(other),
                },
            }
        }
        warn!(session_id = %session.id, "session code already taken; drawing another");
        session.id = generate_session_code();
    }
    Err(ServiceError::Conflict(
        "Could not allocate a game code, please retry".into(),
    ))
}

/// Outcome of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReceipt {
    /// Team the player landed on.
    pub team_name: String,
}

/// Add `player` to a pending session, per the session's join rule.
pub async fn join_session(
    state: &SharedState,
    player: Option<&Player>,
    session_id: &str,
    team_name: Option<&str>,
) -> Result<JoinReceipt, ServiceError> {
    let player = require_player(player, "join a game")?;
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    let policy = policy_for(session.mode);
    ensure_pending(&session)?;

    let teams = store.list_teams(session.id.clone()).await?;
    if teams.iter().any(|team| team.has_member(&player.id)) {
        return Err(Rejection::AlreadyJoined.into());
    }

    let capacity = session.max_players.unwrap_or_default();
    let team = match policy.join_rule() {
        JoinRule::Closed => {
            return Err(Rejection::UnsupportedAction {
                mode: session.mode,
                action: "join",
            }
            .into());
        }
        JoinRule::SoloSlot => {
            let participants = store.count_participants(session.id.clone()).await?;
            if participants >= capacity {
                return Err(Rejection::SessionFull.into());
            }
            match teams
                .iter()
                .find(|team| team.members.is_empty() && team.name == player.username)
            {
                Some(team) => team.clone(),
                None => {
                    let team = TeamEntity::new(session.id.clone(), player.username.clone());
                    store.create_team(team.clone()).await?;
                    team
                }
            }
        }
        JoinRule::ChooseTeam => {
            let name = team_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or(Rejection::TeamNameRequired)?;
            teams
                .iter()
                .find(|team| team.name == name)
                .cloned()
                .ok_or(Rejection::UnknownTeam)?
        }
    };

    add_member(store.as_ref(), &team, player).await?;
    if policy.join_rule() == JoinRule::SoloSlot {
        release_overflow(store.as_ref(), &session.id, player, capacity).await?;
    }
    info!(session_id, player_id = %player.id, team = %team.name, "player joined");

    let teams = store.list_teams(session.id.clone()).await?;
    push_roster(state, EVENT_PLAYER_JOINED, session_id, player, &teams);
    Ok(JoinReceipt {
        team_name: team.name,
    })
}

/// Undo a scrum join that pushed the roster past `capacity`.
///
/// Concurrent joins can all pass the quota read before any of them is written. Every join
/// counts again once its own membership is stored and withdraws when the roster overflows, so
/// the roster never stays above the quota.
async fn release_overflow(
    store: &dyn SessionStore,
    session_id: &str,
    player: &Player,
    capacity: u32,
) -> Result<(), ServiceError> {
    let participants = store.count_participants(session_id.to_owned()).await?;
    if participants <= capacity {
        return Ok(());
    }
    store
        .remove_member(session_id.to_owned(), player.id.clone())
        .await?;
    debug!(session_id, player_id = %player.id, participants, capacity, "join withdrawn over quota");
    Err(Rejection::SessionFull.into())
}

async fn add_member(
    store: &dyn SessionStore,
    team: &TeamEntity,
    player: &Player,
) -> Result<(), ServiceError> {
    store
        .add_member(team.id, player.as_member())
        .await
        .map_err(|err| match ServiceError::from(err) {
            ServiceError::Conflict(_) => Rejection::AlreadyJoined.into(),
            other => other,
        })
}

/// Move a member of a pending team session to another team.
pub async fn switch_team(
    state: &SharedState,
    player: Option<&Player>,
    session_id: &str,
    team_name: &str,
) -> Result<JoinReceipt, ServiceError> {
    let player = require_player(player, "switch team")?;
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    if policy_for(session.mode).join_rule() != JoinRule::ChooseTeam {
        return Err(Rejection::UnsupportedAction {
            mode: session.mode,
            action: "switch team",
        }
        .into());
    }
    ensure_pending(&session)?;

    let teams = store.list_teams(session.id.clone()).await?;
    let current = teams
        .iter()
        .find(|team| team.has_member(&player.id))
        .ok_or(Rejection::NotMember)?;
    let target = teams
        .iter()
        .find(|team| team.name == team_name.trim())
        .ok_or(Rejection::UnknownTeam)?;
    if current.id == target.id {
        return Ok(JoinReceipt {
            team_name: target.name.clone(),
        });
    }

    store
        .remove_member(session.id.clone(), player.id.clone())
        .await?;
    if let Err(err) = add_member(store.as_ref(), target, player).await {
        if let Err(restore) = store.add_member(current.id, player.as_member()).await {
            warn!(
                session_id,
                player_id = %player.id,
                team = %current.name,
                error = %restore,
                "failed to restore membership after a failed switch"
            );
        }
        return Err(err);
    }
    info!(session_id, player_id = %player.id, from = %current.name, to = %target.name, "player switched team");

    let receipt = JoinReceipt {
        team_name: target.name.clone(),
    };
    let teams = store.list_teams(session.id.clone()).await?;
    push_roster(state, EVENT_TEAM_SWITCH, session_id, player, &teams);
    Ok(receipt)
}

/// Remove a player from a pending multiplayer session.
pub async fn leave_session(
    state: &SharedState,
    player: Option<&Player>,
    session_id: &str,
) -> Result<(), ServiceError> {
    let player = require_player(player, "leave a game")?;
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    if policy_for(session.mode).join_rule() == JoinRule::Closed {
        return Err(Rejection::UnsupportedAction {
            mode: session.mode,
            action: "leave",
        }
        .into());
    }
    ensure_pending(&session)?;

    if !store
        .remove_member(session.id.clone(), player.id.clone())
        .await?
    {
        return Err(Rejection::NotMember.into());
    }
    info!(session_id, player_id = %player.id, "player left");

    let teams = store.list_teams(session.id.clone()).await?;
    push_roster(state, EVENT_PLAYER_LEFT, session_id, player, &teams);
    Ok(())
}

/// Start a pending session on behalf of its owner and dispatch question 1.
pub async fn start_session(
    state: &SharedState,
    player: Option<&Player>,
    session_id: &str,
) -> Result<(), ServiceError> {
    let player = require_player(player, "start a game")?;
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    if session.owner_id.as_deref() != Some(player.id.as_str()) {
        return Err(Rejection::NotOwner.into());
    }
    let started = next_status(session.status, SessionEvent::Start)?;

    let policy = policy_for(session.mode);
    let teams = store.list_teams(session.id.clone()).await?;
    let roster = RosterCounts {
        participants: store.count_participants(session.id.clone()).await?,
        teams_with_players: u32::try_from(
            teams.iter().filter(|team| !team.members.is_empty()).count(),
        )
        .unwrap_or(u32::MAX),
    };
    policy.start_precondition(roster, session.max_players)?;

    let patch = SessionPatch {
        status: Some(started),
        ..SessionPatch::default()
    };
    if store
        .update_session(
            session.id.clone(),
            SessionGuard::status(SessionStatus::Pending),
            patch,
        )
        .await?
        .is_none()
    {
        return Err(Rejection::AlreadyStarted.into());
    }

    let total = store.count_questions(session.quiz_id).await?;
    info!(session_id, participants = roster.participants, total, "session started");
    push_game_started(state, session_id, total);
    dispatch_round(state, session_id).await
}

/// Summary of a session with its roster.
pub async fn session_summary(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionSummary, ServiceError> {
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    let total = store.count_questions(session.quiz_id).await?;
    let teams = store.list_teams(session.id.clone()).await?;
    Ok(SessionSummary::new(&session, total, &teams))
}

/// Current standings of a session the caller takes part in.
pub async fn session_ranking(
    state: &SharedState,
    player: Option<&Player>,
    session_id: &str,
) -> Result<Ranking, ServiceError> {
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    authorize_participant(store.as_ref(), &session, player).await?;
    compute_ranking(store.as_ref(), &session).await
}

/// Subscribe a connection to a session room once its player is known to take part.
pub async fn enter_room(
    state: &SharedState,
    player: Option<&Player>,
    session_id: &str,
    connection: ClientConnection,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let session = load_session(store.as_ref(), session_id).await?;
    authorize_participant(store.as_ref(), &session, player).await?;
    state.hub().enter(session_id, connection);
    Ok(())
}

fn ensure_pending(session: &SessionEntity) -> Result<(), Rejection> {
    match session.status {
        SessionStatus::Pending => Ok(()),
        SessionStatus::Started => Err(Rejection::AlreadyStarted),
        SessionStatus::Finished => Err(Rejection::Finished),
    }
}
