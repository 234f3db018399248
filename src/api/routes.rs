use std::convert::Infallible;

use serde_json::Value;
use warp::{
    filters::{
        path::{FullPath, Tail},
        BoxedFilter,
    },
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use super::{auth, catalog, recipes, reply, users};
use crate::{
    actions::{Relation, Toggle},
    constants::MAX_BODY_SIZE,
    form::QueryParams,
    middleware::{with_possible_session, with_session},
    pagination::PageLink,
    schema::Uuid,
    state::{with_state, AppState},
};

/// Base for `next`/`previous` links: the public URL followed by the request path.
pub fn page_link(state: &AppState, path: &FullPath, params: QueryParams) -> PageLink {
    let base = format!(
        "{}{}",
        state.config.public_url.trim_end_matches('/'),
        path.as_str()
    );
    PageLink::new(base, params)
}

/// End of the path, with or without a trailing slash.
fn path_end() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::path::tail()
        .and_then(|tail: Tail| async move {
            if tail.as_str().is_empty() {
                Ok(())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .untuple_one()
}

fn with_query() -> impl Filter<Extract = (QueryParams,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>().map(QueryParams::from_pairs)
}

fn json_body() -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

/// GET and POST add the relation, DELETE removes it.
fn with_toggle() -> impl Filter<Extract = (Toggle,), Error = Rejection> + Clone {
    let add = warp::get().or(warp::post()).unify().map(|| Toggle::Add);
    let remove = warp::delete().map(|| Toggle::Remove);
    add.or(remove).unify()
}

fn with_relation(relation: Relation) -> impl Filter<Extract = (Relation,), Error = Infallible> + Clone {
    warp::any().map(move || relation)
}

fn user_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let root = warp::path("users");
    let item = root.and(warp::path::param::<Uuid>());

    let list = root
        .and(path_end())
        .and(warp::get())
        .and(with_query())
        .and(warp::path::full())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::list);

    let register = root
        .and(path_end())
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::register);

    let me = root
        .and(warp::path("me"))
        .and(path_end())
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::me);

    let subscriptions = root
        .and(warp::path("subscriptions"))
        .and(path_end())
        .and(warp::get())
        .and(with_query())
        .and(warp::path::full())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::subscriptions);

    let set_password = root
        .and(warp::path("set_password"))
        .and(path_end())
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::change_password);

    let retrieve = item
        .and(path_end())
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::retrieve);

    let update = item
        .and(path_end())
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::update);

    let destroy = item
        .and(path_end())
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::destroy);

    let subscribe = item
        .and(warp::path("subscribe"))
        .and(path_end())
        .and(with_toggle())
        .and(with_query())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(users::subscribe);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(subscriptions)
        .unify()
        .or(set_password)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(destroy)
        .unify()
        .or(subscribe)
        .unify()
        .boxed()
}

fn recipe_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let root = warp::path("recipes");
    let item = root.and(warp::path::param::<Uuid>());

    let list = root
        .and(path_end())
        .and(warp::get())
        .and(with_query())
        .and(warp::path::full())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::list);

    let create = root
        .and(path_end())
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipes::create);

    let download = root
        .and(warp::path("download_shopping_cart"))
        .and(path_end())
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::download_shopping_cart);

    let retrieve = item
        .and(path_end())
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::retrieve);

    let update = item
        .and(path_end())
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipes::update);

    let destroy = item
        .and(path_end())
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::destroy);

    let favorite = item
        .and(warp::path("favorite"))
        .and(path_end())
        .and(with_relation(Relation::Favorite))
        .and(with_toggle())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::toggle);

    let shopping_cart = item
        .and(warp::path("shopping_cart"))
        .and(path_end())
        .and(with_relation(Relation::ShoppingCart))
        .and(with_toggle())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(recipes::toggle);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(destroy)
        .unify()
        .or(favorite)
        .unify()
        .or(shopping_cart)
        .unify()
        .boxed()
}

fn catalog_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let tags = warp::path("tags")
        .and(path_end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(catalog::tags);

    let tag = warp::path("tags")
        .and(warp::path::param::<Uuid>())
        .and(path_end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(catalog::tag);

    let ingredients = warp::path("ingredients")
        .and(path_end())
        .and(warp::get())
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(catalog::ingredients);

    let ingredient = warp::path("ingredients")
        .and(warp::path::param::<Uuid>())
        .and(path_end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(catalog::ingredient);

    tags.or(tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .boxed()
}

fn auth_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let token = warp::path("auth").and(warp::path("token"));

    let login = token
        .and(warp::path("login"))
        .and(path_end())
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(auth::login);

    let logout = token
        .and(warp::path("logout"))
        .and(path_end())
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(auth::logout);

    login.or(logout).unify().boxed()
}

/// Everything under `/api`.
pub fn api(state: AppState) -> BoxedFilter<(Response,)> {
    let routes = user_routes(state.clone())
        .or(recipe_routes(state.clone()))
        .unify()
        .or(catalog_routes(state.clone()))
        .unify()
        .or(auth_routes(state))
        .unify();

    warp::path("api").and(routes).boxed()
}

/// Static files under the media URL, e.g. `/media/recipes/images/<file>`.
fn media(state: &AppState) -> BoxedFilter<(Response,)> {
    let mount = state
        .config
        .media_mount()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment.to_owned())).boxed()
        });

    mount
        .and(warp::get())
        .and(warp::fs::dir(state.config.media_root.clone()))
        .map(|file: warp::fs::File| file.into_response())
        .boxed()
}

/// The complete service: API, media files, error recovery and request logging.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = media(&state);

    api(state)
        .or(media)
        .unify()
        .recover(reply::handle_rejection)
        .unify()
        .with(warp::log("foodgram::api"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn toggle_follows_the_verb() {
        let add = warp::test::request()
            .method("POST")
            .filter(&with_toggle())
            .await
            .unwrap();
        assert_eq!(add, Toggle::Add);

        let add = warp::test::request()
            .method("GET")
            .filter(&with_toggle())
            .await
            .unwrap();
        assert_eq!(add, Toggle::Add);

        let remove = warp::test::request()
            .method("DELETE")
            .filter(&with_toggle())
            .await
            .unwrap();
        assert_eq!(remove, Toggle::Remove);

        assert!(warp::test::request()
            .method("PUT")
            .filter(&with_toggle())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn trailing_slash_is_optional() {
        let filter = warp::path("recipes").and(path_end());
        assert!(warp::test::request().path("/recipes").matches(&filter).await);
        assert!(warp::test::request().path("/recipes/").matches(&filter).await);
        assert!(!warp::test::request().path("/recipes/1").matches(&filter).await);
    }

    #[tokio::test]
    async fn repeated_query_keys_are_kept() {
        let params = warp::test::request()
            .path("/?tags=lunch&tags=dinner&author=2")
            .filter(&with_query())
            .await
            .unwrap();
        assert_eq!(params.get_all("tags"), vec!["lunch", "dinner"]);
        assert_eq!(params.get("author"), Some("2"));
    }
}
