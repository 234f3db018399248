use serde::{Deserialize, Serialize};
use warp::http::Method;

use crate::{database::error::ApiError, jwt::SessionData, schema::Uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnAccount,
            ActionType::ManageOwnRelations,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnAccount,
            ActionType::ManageOwnRelations,
            ActionType::ManageAllRecipes,
            ActionType::ManageAllAccounts,
        ],
    ),
];

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnAccount,
    ManageOwnRelations,

    ManageAllRecipes,
    ManageAllAccounts,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find(|(role, _)| *role == session.role)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Unsafe requests need an authenticated caller.
pub fn require_session(session: Option<SessionData>) -> Result<SessionData, ApiError> {
    session.ok_or(ApiError::Unauthorized)
}

/// Read for everyone, write for the author or an administrator.
pub fn check_recipe_access(
    method: &Method,
    session: Option<&SessionData>,
    author_id: Uuid,
) -> Result<(), ApiError> {
    if is_safe_method(method) {
        return Ok(());
    }
    let session = session.ok_or(ApiError::Unauthorized)?;

    if session.authenticate(ActionType::ManageAllRecipes).is_ok() {
        return Ok(());
    }
    session.authenticate(ActionType::ManageOwnRecipes)?;
    if author_id != session.user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Same rule applied to a user row: the account itself or an administrator.
pub fn check_account_access(
    method: &Method,
    session: Option<&SessionData>,
    user_id: Uuid,
) -> Result<(), ApiError> {
    if is_safe_method(method) {
        return Ok(());
    }
    let session = session.ok_or(ApiError::Unauthorized)?;

    if session.authenticate(ActionType::ManageAllAccounts).is_ok() {
        return Ok(());
    }
    session.authenticate(ActionType::ManageOwnAccount)?;
    if user_id != session.user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn session(user_id: Uuid, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            username: format!("user{user_id}"),
            role,
            jti: "jti".into(),
            exp: 0,
        }
    }

    #[rstest]
    #[case(Method::GET, None, Ok(()))]
    #[case(Method::PATCH, None, Err(401))]
    #[case(Method::DELETE, Some(session(1, UserRole::User)), Ok(()))]
    #[case(Method::PATCH, Some(session(2, UserRole::User)), Err(403))]
    #[case(Method::DELETE, Some(session(2, UserRole::Admin)), Ok(()))]
    #[case(Method::GET, Some(session(2, UserRole::User)), Ok(()))]
    fn recipe_access(
        #[case] method: Method,
        #[case] caller: Option<SessionData>,
        #[case] expected: Result<(), u16>,
    ) {
        let result = check_recipe_access(&method, caller.as_ref(), 1).map_err(|e| e.status().as_u16());
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case(Method::PATCH, None, Err(401))]
    #[case(Method::PATCH, Some(session(5, UserRole::User)), Ok(()))]
    #[case(Method::DELETE, Some(session(6, UserRole::User)), Err(403))]
    #[case(Method::DELETE, Some(session(6, UserRole::Admin)), Ok(()))]
    fn account_access(
        #[case] method: Method,
        #[case] caller: Option<SessionData>,
        #[case] expected: Result<(), u16>,
    ) {
        let result = check_account_access(&method, caller.as_ref(), 5).map_err(|e| e.status().as_u16());
        assert_eq!(result, expected);
    }

    #[test]
    fn only_admins_manage_everything() {
        assert!(ActionType::ManageAllRecipes.authenticate(&session(1, UserRole::Admin)));
        assert!(!ActionType::ManageAllRecipes.authenticate(&session(1, UserRole::User)));
        assert!(ActionType::ManageOwnRelations.authenticate(&session(1, UserRole::User)));
    }

    #[test]
    fn anonymous_writes_need_a_session() {
        assert!(matches!(require_session(None), Err(ApiError::Unauthorized)));
    }
}
