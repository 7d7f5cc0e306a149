//! Session lookup and the "is this caller part of the session" checks shared by every action.

use crate::{
    dao::{models::SessionEntity, session_store::SessionStore},
    error::{Rejection, ServiceError},
    state::{game::Player, mode::policy_for},
};

/// Caller identity, or the rejection naming the action that needed one.
pub fn require_player<'a>(
    player: Option<&'a Player>,
    action: &'static str,
) -> Result<&'a Player, Rejection> {
    player.ok_or(Rejection::AuthenticationRequired(action))
}

/// Fetch a session, mapping absence to `NotFound`.
pub async fn load_session(
    store: &dyn SessionStore,
    session_id: &str,
) -> Result<SessionEntity, ServiceError> {
    store
        .get_session(session_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound("Game not found".into()))
}

/// Check that `player` may act on `session`.
///
/// Multiplayer sessions require team membership. Solo sessions with an owner accept the
/// owner only; anonymous solo sessions accept whoever holds the code.
pub async fn authorize_participant(
    store: &dyn SessionStore,
    session: &SessionEntity,
    player: Option<&Player>,
) -> Result<(), ServiceError> {
    if policy_for(session.mode).is_multiplayer() {
        let player = require_player(player, "play this game")?;
        let teams = store.list_teams(session.id.clone()).await?;
        if teams.iter().any(|team| team.has_member(&player.id)) {
            Ok(())
        } else {
            Err(Rejection::NotMember.into())
        }
    } else {
        match session.owner_id.as_deref() {
            None => Ok(()),
            Some(owner) if player.is_some_and(|player| player.id == owner) => Ok(()),
            Some(_) => Err(Rejection::NotMember.into()),
        }
    }
}
