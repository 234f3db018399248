use chrono::Local;
use serde_json::Value;
use warp::{filters::path::FullPath, http::Method, reject::Rejection, reply::Response};

use super::{reply, routes::page_link};
use crate::{
    actions::{
        aggregate, cart_is_empty, create_recipe, delete_recipe, get_recipe, get_user_by_id,
        list_cart_parts, list_recipes, toggle_relation, update_recipe, validate_recipe_refs,
        Relation, Toggle,
    },
    constants::{RECIPE_COUNT_PER_PAGE, SHOPPING_LIST_FILENAME},
    error::ApiError,
    export::render_shopping_list,
    filters::RecipeFilter,
    form::{Form, QueryParams, RecipeForm, WriteMode},
    jwt::SessionData,
    media::{remove_image, save_image},
    pagination::{Page, PageRequest},
    permissions::{check_recipe_access, ActionType},
    schema::{Recipe, Uuid},
    serializers::{render_recipes, RecipeShortView, RecipeView},
    state::AppState,
};

async fn find_recipe(id: Uuid, state: &AppState) -> Result<Recipe, ApiError> {
    get_recipe(id, &state.pool).await?.ok_or(ApiError::NotFound)
}

async fn render_recipe(
    recipe: &Recipe,
    session: Option<&SessionData>,
    state: &AppState,
) -> Result<RecipeView, ApiError> {
    render_recipes(
        std::slice::from_ref(recipe),
        session,
        &state.config.media_url,
        &state.pool,
    )
    .await?
    .pop()
    .ok_or_else(|| ApiError::internal("Recipe rendering returned nothing"))
}

pub async fn list(
    params: QueryParams,
    path: FullPath,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_query(&params, session.as_ref().map(|s| s.user_id))?;
    let request = PageRequest::from_query(&params, RECIPE_COUNT_PER_PAGE)?;

    let (recipes, total) = list_recipes(&filter, request, &state.pool).await?;
    let views = render_recipes(
        &recipes,
        session.as_ref(),
        &state.config.media_url,
        &state.pool,
    )
    .await?;

    let link = page_link(&state, &path, params);
    Ok(reply::ok(&Page::from_rows(views, total, request, &link)))
}

pub async fn retrieve(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    let view = render_recipe(&recipe, session.as_ref(), &state).await?;

    Ok(reply::ok(&view))
}

pub async fn create(session: SessionData, body: Value, state: AppState) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;

    let form = RecipeForm::parse(&Form::from_value(body)?, WriteMode::Create)?;
    let tags = validate_recipe_refs(&form, session.user_id, None, &state.pool)
        .await?
        .unwrap_or_default();

    let image = form
        .image
        .as_ref()
        .ok_or_else(|| ApiError::validation("image", "This field is required."))?;
    let image = save_image(image, &state.config.media_root).await?;

    let recipe = match create_recipe(session.user_id, &form, &image, &tags, &state.pool).await {
        Ok(recipe) => recipe,
        Err(e) => {
            remove_image(&image, &state.config.media_root).await;
            return Err(e.into());
        }
    };

    let view = render_recipe(&recipe, Some(&session), &state).await?;
    Ok(reply::created(&view))
}

pub async fn update(
    id: Uuid,
    session: SessionData,
    body: Value,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    check_recipe_access(&Method::PATCH, Some(&session), recipe.author_id)?;

    let form = RecipeForm::parse(&Form::from_value(body)?, WriteMode::Update)?;
    let tags = validate_recipe_refs(&form, recipe.author_id, Some(recipe.id), &state.pool).await?;

    let image = match &form.image {
        Some(image) => Some(save_image(image, &state.config.media_root).await?),
        None => None,
    };

    let updated = update_recipe(
        recipe.id,
        &form,
        image.as_deref(),
        tags.as_deref(),
        &state.pool,
    )
    .await;

    let updated = match (updated, image) {
        (Ok(updated), Some(_)) => {
            remove_image(&recipe.image, &state.config.media_root).await;
            updated
        }
        (Ok(updated), None) => updated,
        (Err(e), image) => {
            if let Some(image) = image {
                remove_image(&image, &state.config.media_root).await;
            }
            return Err(e.into());
        }
    };

    let view = render_recipe(&updated, Some(&session), &state).await?;
    Ok(reply::ok(&view))
}

pub async fn destroy(id: Uuid, session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    check_recipe_access(&Method::DELETE, Some(&session), recipe.author_id)?;

    let image = delete_recipe(recipe.id, &state.pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    remove_image(&image, &state.config.media_root).await;

    log::info!("User {} deleted recipe {}", session.user_id, recipe.id);
    Ok(reply::no_content())
}

/// Shared handler of the favorite and shopping cart toggles.
pub async fn toggle(
    id: Uuid,
    relation: Relation,
    toggle: Toggle,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    toggle_relation(relation, toggle, session.user_id, id, &state.pool).await?;

    match toggle {
        Toggle::Remove => Ok(reply::no_content()),
        Toggle::Add => {
            let recipe = find_recipe(id, &state).await?;
            Ok(reply::created(&RecipeShortView::new(
                &recipe,
                &state.config.media_url,
            )))
        }
    }
}

pub async fn download_shopping_cart(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    if cart_is_empty(session.user_id, &state.pool).await? {
        return Err(ApiError::bad_request("Shopping cart is empty.").into());
    }

    let user = get_user_by_id(session.user_id, &state.pool)
        .await?
        .ok_or(ApiError::InvalidToken)?;
    let entries = aggregate(list_cart_parts(user.id, &state.pool).await?);
    let font = state.config.pdf_font.clone();

    let bytes = tokio::task::spawn_blocking(move || {
        render_shopping_list(&user.first_name, &entries, Local::now(), font.as_deref())
    })
    .await
    .map_err(ApiError::internal)?
    .map_err(ApiError::internal)?;

    Ok(reply::attachment(
        bytes,
        "application/pdf",
        SHOPPING_LIST_FILENAME,
    ))
}
