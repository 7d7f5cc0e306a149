use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use crate::state::game::Player;

/// Header carrying the authenticated player id, set by the upstream gateway.
pub const PLAYER_ID_HEADER: &str = "x-player-id";
/// Header carrying the display name of the authenticated player.
pub const PLAYER_NAME_HEADER: &str = "x-player-name";

/// Caller identity forwarded by the authentication gateway; `None` for anonymous callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity(pub Option<Player>);

impl Identity {
    /// Authenticated player, if any.
    pub fn player(&self) -> Option<&Player> {
        self.0.as_ref()
    }

    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };
        let player = header(PLAYER_ID_HEADER).map(|id| {
            let username = header(PLAYER_NAME_HEADER).unwrap_or(id);
            Player::new(id, username)
        });
        Identity(player)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn missing_id_means_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(PLAYER_NAME_HEADER, HeaderValue::from_static("alice"));
        assert_eq!(Identity::from_headers(&headers), Identity(None));
    }

    #[test]
    fn name_falls_back_to_the_id() {
        let mut headers = HeaderMap::new();
        headers.insert(PLAYER_ID_HEADER, HeaderValue::from_static(" p-1 "));
        let identity = Identity::from_headers(&headers);
        assert_eq!(identity.player(), Some(&Player::new("p-1", "p-1")));
    }

    #[test]
    fn reads_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(PLAYER_ID_HEADER, HeaderValue::from_static("p-2"));
        headers.insert(PLAYER_NAME_HEADER, HeaderValue::from_static("bob"));
        assert_eq!(
            Identity::from_headers(&headers).player(),
            Some(&Player::new("p-2", "bob"))
        );
    }
}
