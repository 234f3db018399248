use serde_json::{json, Value};
use warp::{reject::Rejection, reply::Response};

use super::reply;
use crate::{
    actions::{login_user, revoke_token},
    form::{Form, LoginForm},
    jwt::SessionData,
    state::AppState,
};

pub async fn login(body: Value, state: AppState) -> Result<Response, Rejection> {
    let form = LoginForm::parse(&Form::from_value(body)?)?;
    let ttl = chrono::Duration::hours(state.config.token_ttl_hours);
    let token = login_user(&form, &state.config.secret, ttl, &state.pool).await?;

    Ok(reply::ok(&json!({ "auth_token": token })))
}

pub async fn logout(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    revoke_token(&session.jti, session.exp, &state.pool).await?;
    log::debug!("User {} logged out", session.user_id);

    Ok(reply::no_content())
}
