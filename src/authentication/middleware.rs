use warp::{reject::Rejection, Filter};

use super::{
    jwt::{verify_jwt_session, SessionData},
    permissions::require_session,
};
use crate::{
    database::actions::tokens::session_admin_flag,
    error::ApiError,
    state::{with_state, AppState},
};

/// Extracts the token from `Authorization: Token <jwt>` or `Authorization: Bearer <jwt>`.
pub fn parse_authorization(header: &str) -> Result<&str, ApiError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(ApiError::InvalidToken)?;

    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::InvalidToken);
    }

    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        return Err(ApiError::InvalidToken);
    }
    Ok(token)
}

async fn resolve_session(
    header: Option<String>,
    state: &AppState,
) -> Result<Option<SessionData>, ApiError> {
    let Some(header) = header else {
        return Ok(None);
    };

    let token = parse_authorization(&header)?;
    let claims = verify_jwt_session(token, &state.config.secret)?;

    match session_admin_flag(claims.user_id, &claims.jti, &state.pool).await? {
        Some(is_admin) => Ok(Some(SessionData::from_claims(claims, is_admin))),
        None => {
            log::debug!("Rejected revoked or orphaned token for user {}", claims.user_id);
            Err(ApiError::InvalidToken)
        }
    }
}

/// The caller's session when a token was sent; anonymous requests pass with `None`.
/// A token that fails verification rejects the request.
pub fn with_possible_session(
    state: AppState,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            resolve_session(header, &state)
                .await
                .map_err(Rejection::from)
        })
}

/// Like [`with_possible_session`] but rejects anonymous requests with 401.
pub fn with_session(
    state: AppState,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_possible_session(state).and_then(|session: Option<SessionData>| async move {
        require_session(session).map_err(Rejection::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_token_and_bearer() {
        assert_eq!(parse_authorization("Token abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(parse_authorization("bearer abc").unwrap(), "abc");
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(parse_authorization("abc").is_err());
        assert!(parse_authorization("Basic dXNlcjpwYXNz").is_err());
        assert!(parse_authorization("Token ").is_err());
        assert!(parse_authorization("Token a b").is_err());
    }
}
