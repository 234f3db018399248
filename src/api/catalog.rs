use warp::{reject::Rejection, reply::Response};

use super::reply;
use crate::{
    actions::{get_ingredient, get_tag, list_ingredients, list_tags},
    error::ApiError,
    filters::IngredientFilter,
    form::QueryParams,
    schema::Uuid,
    state::AppState,
};

pub async fn tags(state: AppState) -> Result<Response, Rejection> {
    let tags = list_tags(&state.pool).await?;
    Ok(reply::ok(&tags))
}

pub async fn tag(id: Uuid, state: AppState) -> Result<Response, Rejection> {
    let tag = get_tag(id, &state.pool).await?.ok_or(ApiError::NotFound)?;
    Ok(reply::ok(&tag))
}

pub async fn ingredients(params: QueryParams, state: AppState) -> Result<Response, Rejection> {
    let filter = IngredientFilter::from_query(&params);
    let ingredients = list_ingredients(&filter, &state.pool).await?;
    Ok(reply::ok(&ingredients))
}

pub async fn ingredient(id: Uuid, state: AppState) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(id, &state.pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(reply::ok(&ingredient))
}
