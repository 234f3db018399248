use serde_json::Value;
use warp::{filters::path::FullPath, http::Method, reject::Rejection, reply::Response};

use super::{reply, routes::page_link};
use crate::{
    actions::{
        create_user, delete_user, get_user_by_id, list_author_images, list_subscriptions,
        list_users, set_password, toggle_relation, update_user, Relation, Toggle,
    },
    constants::{SUBSCRIPTION_RECIPES_LIMIT, USER_COUNT_PER_PAGE},
    error::ApiError,
    form::{Form, QueryParams, SetPasswordForm, UserForm, UserUpdateForm},
    jwt::SessionData,
    media::remove_image,
    pagination::{Page, PageRequest},
    permissions::{check_account_access, ActionType},
    schema::{User, Uuid},
    serializers::{render_authors, render_users, RegisteredUserView, UserView},
    state::AppState,
};

fn recipes_limit(params: &QueryParams) -> Result<i64, ApiError> {
    Ok(params
        .get_number::<i64>("recipes_limit")?
        .map(|limit| limit.max(0))
        .unwrap_or(SUBSCRIPTION_RECIPES_LIMIT))
}

async fn find_user(id: Uuid, state: &AppState) -> Result<User, ApiError> {
    get_user_by_id(id, &state.pool).await?.ok_or(ApiError::NotFound)
}

async fn render_user(
    user: &User,
    session: Option<&SessionData>,
    state: &AppState,
) -> Result<UserView, ApiError> {
    render_users(std::slice::from_ref(user), session, &state.pool)
        .await?
        .pop()
        .ok_or_else(|| ApiError::internal("User rendering returned nothing"))
}

pub async fn list(
    params: QueryParams,
    path: FullPath,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let request = PageRequest::from_query(&params, USER_COUNT_PER_PAGE)?;
    let (users, total) = list_users(request, &state.pool).await?;
    let views = render_users(&users, session.as_ref(), &state.pool).await?;

    let link = page_link(&state, &path, params);
    Ok(reply::ok(&Page::from_rows(views, total, request, &link)))
}

pub async fn register(body: Value, state: AppState) -> Result<Response, Rejection> {
    let form = UserForm::parse(&Form::from_value(body)?)?;
    let user = create_user(&form, false, &state.pool).await?;

    Ok(reply::created(&RegisteredUserView::from(&user)))
}

pub async fn retrieve(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let user = find_user(id, &state).await?;
    let view = render_user(&user, session.as_ref(), &state).await?;

    Ok(reply::ok(&view))
}

pub async fn me(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let user = get_user_by_id(session.user_id, &state.pool)
        .await?
        .ok_or(ApiError::InvalidToken)?;
    let view = render_user(&user, Some(&session), &state).await?;

    Ok(reply::ok(&view))
}

pub async fn update(
    id: Uuid,
    session: SessionData,
    body: Value,
    state: AppState,
) -> Result<Response, Rejection> {
    check_account_access(&Method::PATCH, Some(&session), id)?;
    let user = find_user(id, &state).await?;

    let form = UserUpdateForm::parse(&Form::from_value(body)?)?;
    let user = update_user(&user, &form, &state.pool).await?;
    let view = render_user(&user, Some(&session), &state).await?;

    Ok(reply::ok(&view))
}

pub async fn destroy(id: Uuid, session: SessionData, state: AppState) -> Result<Response, Rejection> {
    check_account_access(&Method::DELETE, Some(&session), id)?;
    let user = find_user(id, &state).await?;

    let images = list_author_images(user.id, &state.pool).await?;
    if !delete_user(user.id, &state.pool).await? {
        return Err(ApiError::NotFound.into());
    }
    for image in images {
        remove_image(&image, &state.config.media_root).await;
    }

    log::info!("Deleted user {} ({})", user.username, user.id);
    Ok(reply::no_content())
}

pub async fn change_password(
    session: SessionData,
    body: Value,
    state: AppState,
) -> Result<Response, Rejection> {
    let form = SetPasswordForm::parse(&Form::from_value(body)?)?;
    set_password(
        session.user_id,
        &form.current_password,
        &form.new_password,
        &state.pool,
    )
    .await?;

    Ok(reply::no_content())
}

pub async fn subscriptions(
    params: QueryParams,
    path: FullPath,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let request = PageRequest::from_query(&params, USER_COUNT_PER_PAGE)?;
    let limit = recipes_limit(&params)?;

    let (authors, total) = list_subscriptions(session.user_id, request, &state.pool).await?;
    let views = render_authors(
        &authors,
        Some(&session),
        limit,
        &state.config.media_url,
        &state.pool,
    )
    .await?;

    let link = page_link(&state, &path, params);
    Ok(reply::ok(&Page::from_rows(views, total, request, &link)))
}

pub async fn subscribe(
    id: Uuid,
    toggle: Toggle,
    params: QueryParams,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let limit = recipes_limit(&params)?;

    toggle_relation(Relation::Subscribe, toggle, session.user_id, id, &state.pool).await?;

    if toggle == Toggle::Remove {
        return Ok(reply::no_content());
    }

    let author = find_user(id, &state).await?;
    let view = render_authors(
        std::slice::from_ref(&author),
        Some(&session),
        limit,
        &state.config.media_url,
        &state.pool,
    )
    .await?
    .pop()
    .ok_or_else(|| ApiError::internal("Author rendering returned nothing"))?;

    Ok(reply::created(&view))
}
