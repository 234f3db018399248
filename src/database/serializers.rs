use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::{Pool, Postgres};

use super::{
    actions::{
        count_author_recipes, list_author_recipes, list_recipe_parts, list_recipe_tags,
        list_users_by_ids, related_ids, Relation,
    },
    error::ApiError,
    schema::{Recipe, RecipePart, Tag, User, Uuid},
};
use crate::{jwt::SessionData, media::image_url};

/// The caller of a request plus which of the rendered rows they favorited,
/// put in their cart or subscribed to.
#[derive(Debug, Clone, Default)]
pub struct RequesterContext {
    pub user_id: Option<Uuid>,
    pub favorites: HashSet<Uuid>,
    pub shopping_cart: HashSet<Uuid>,
    pub subscriptions: HashSet<Uuid>,
}

impl RequesterContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Loads the relation sets restricted to the recipes and authors about to be rendered.
    pub async fn load(
        session: Option<&SessionData>,
        recipe_ids: &[Uuid],
        author_ids: &[Uuid],
        pool: &Pool<Postgres>,
    ) -> Result<Self, ApiError> {
        let Some(session) = session else {
            return Ok(Self::anonymous());
        };
        let user_id = session.user_id;

        Ok(Self {
            user_id: Some(user_id),
            favorites: related_ids(Relation::Favorite, user_id, recipe_ids, pool).await?,
            shopping_cart: related_ids(Relation::ShoppingCart, user_id, recipe_ids, pool).await?,
            subscriptions: related_ids(Relation::Subscribe, user_id, author_ids, pool).await?,
        })
    }

    /// False for anonymous callers and for the caller's own account.
    pub fn is_subscribed(&self, user: &User) -> bool {
        match self.user_id {
            Some(me) if me != user.id => self.subscriptions.contains(&user.id),
            _ => false,
        }
    }

    pub fn is_favorited(&self, recipe: &Recipe) -> bool {
        self.user_id.is_some() && self.favorites.contains(&recipe.id)
    }

    pub fn is_in_shopping_cart(&self, recipe: &Recipe) -> bool {
        self.user_id.is_some() && self.shopping_cart.contains(&recipe.id)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn new(user: &User, requester: &RequesterContext) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed: requester.is_subscribed(user),
        }
    }
}

/// Response of a successful registration.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RegisteredUserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for RegisteredUserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeShortView {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShortView {
    pub fn new(recipe: &Recipe, media_url: &str) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: image_url(media_url, &recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// An author as listed under subscriptions.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AuthorView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShortView>,
    pub recipes_count: i64,
}

impl AuthorView {
    pub fn new(user: &User, requester: &RequesterContext, recipes: Vec<RecipeShortView>, recipes_count: i64) -> Self {
        let user = UserView::new(user, requester);
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed: user.is_subscribed,
            recipes,
            recipes_count,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeIngredientView {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<&RecipePart> for RecipeIngredientView {
    fn from(part: &RecipePart) -> Self {
        Self {
            id: part.id,
            name: part.name.clone(),
            measurement_unit: part.measurement_unit.clone(),
            amount: part.amount,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeView {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Tags, ingredient amounts and authors of a batch of recipes.
#[derive(Debug, Default)]
pub struct RecipeRelations {
    pub tags: HashMap<Uuid, Vec<Tag>>,
    pub parts: HashMap<Uuid, Vec<RecipeIngredientView>>,
    pub authors: HashMap<Uuid, User>,
}

impl RecipeView {
    pub fn new(
        recipe: &Recipe,
        relations: &RecipeRelations,
        requester: &RequesterContext,
        media_url: &str,
    ) -> Result<Self, ApiError> {
        let author = relations
            .authors
            .get(&recipe.author_id)
            .ok_or_else(|| ApiError::internal(format!("Author of recipe {} not loaded", recipe.id)))?;

        Ok(Self {
            id: recipe.id,
            tags: relations.tags.get(&recipe.id).cloned().unwrap_or_default(),
            author: UserView::new(author, requester),
            ingredients: relations.parts.get(&recipe.id).cloned().unwrap_or_default(),
            name: recipe.name.clone(),
            image: image_url(media_url, &recipe.image),
            text: recipe.text.clone(),
            cooking_time: recipe.cooking_time,
            is_favorited: requester.is_favorited(recipe),
            is_in_shopping_cart: requester.is_in_shopping_cart(recipe),
        })
    }
}

fn unique_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

pub async fn render_users(
    users: &[User],
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserView>, ApiError> {
    let ids = unique_ids(users.iter().map(|u| u.id));
    let requester = RequesterContext::load(session, &[], &ids, pool).await?;

    Ok(users.iter().map(|u| UserView::new(u, &requester)).collect())
}

pub async fn render_recipes(
    recipes: &[Recipe],
    session: Option<&SessionData>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, ApiError> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }

    let recipe_ids = unique_ids(recipes.iter().map(|r| r.id));
    let author_ids = unique_ids(recipes.iter().map(|r| r.author_id));

    let mut relations = RecipeRelations::default();
    for row in list_recipe_tags(&recipe_ids, pool).await? {
        relations.tags.entry(row.recipe_id).or_default().push(row.into());
    }
    for part in list_recipe_parts(&recipe_ids, pool).await? {
        relations
            .parts
            .entry(part.recipe_id)
            .or_default()
            .push(RecipeIngredientView::from(&part));
    }
    for user in list_users_by_ids(&author_ids, pool).await? {
        relations.authors.insert(user.id, user);
    }

    let requester = RequesterContext::load(session, &recipe_ids, &author_ids, pool).await?;

    recipes
        .iter()
        .map(|r| RecipeView::new(r, &relations, &requester, media_url))
        .collect()
}

pub async fn render_authors(
    authors: &[User],
    session: Option<&SessionData>,
    recipes_limit: i64,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<AuthorView>, ApiError> {
    if authors.is_empty() {
        return Ok(Vec::new());
    }
    let author_ids = unique_ids(authors.iter().map(|u| u.id));

    let mut recipes: HashMap<Uuid, Vec<RecipeShortView>> = HashMap::new();
    for recipe in list_author_recipes(&author_ids, recipes_limit, pool).await? {
        recipes
            .entry(recipe.author_id)
            .or_default()
            .push(RecipeShortView::new(&recipe, media_url));
    }
    let counts: HashMap<Uuid, i64> = count_author_recipes(&author_ids, pool)
        .await?
        .into_iter()
        .map(|c| (c.author_id, c.count))
        .collect();

    let requester = RequesterContext::load(session, &[], &author_ids, pool).await?;

    Ok(authors
        .iter()
        .map(|user| {
            AuthorView::new(
                user,
                &requester,
                recipes.remove(&user.id).unwrap_or_default(),
                counts.get(&user.id).copied().unwrap_or(0),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn user(id: Uuid) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            first_name: "First".into(),
            last_name: "Last".into(),
            password: "hash".into(),
            is_superuser: false,
            date_joined: Utc::now(),
        }
    }

    fn recipe(id: Uuid, author_id: Uuid) -> Recipe {
        Recipe {
            id,
            author_id,
            name: format!("recipe {id}"),
            text: "Mix and bake.".into(),
            cooking_time: 30,
            image: format!("recipes/images/{id}.png"),
            pub_date: Utc::now(),
        }
    }

    fn requester(user_id: Uuid) -> RequesterContext {
        RequesterContext {
            user_id: Some(user_id),
            favorites: HashSet::from([10]),
            shopping_cart: HashSet::from([11]),
            subscriptions: HashSet::from([2, 1]),
        }
    }

    #[test]
    fn never_subscribed_to_self() {
        let context = requester(1);
        assert!(!context.is_subscribed(&user(1)));
        assert!(context.is_subscribed(&user(2)));
        assert!(!context.is_subscribed(&user(3)));
    }

    #[test]
    fn anonymous_flags_are_false() {
        let context = RequesterContext::anonymous();
        assert!(!context.is_subscribed(&user(2)));
        assert!(!context.is_favorited(&recipe(10, 2)));
        assert!(!context.is_in_shopping_cart(&recipe(11, 2)));
    }

    #[test]
    fn recipe_flags_follow_relations() {
        let context = requester(1);
        assert!(context.is_favorited(&recipe(10, 2)));
        assert!(!context.is_in_shopping_cart(&recipe(10, 2)));
        assert!(context.is_in_shopping_cart(&recipe(11, 2)));
    }

    #[test]
    fn user_view_shape() {
        let value = serde_json::to_value(UserView::new(&user(2), &requester(1))).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 2,
                "email": "user2@example.com",
                "username": "user2",
                "first_name": "First",
                "last_name": "Last",
                "is_subscribed": true,
            })
        );
    }

    #[test]
    fn recipe_view_expands_relations() {
        let mut relations = RecipeRelations::default();
        relations.authors.insert(2, user(2));
        relations.tags.insert(
            10,
            vec![Tag {
                id: 1,
                name: "Breakfast".into(),
                color: "#e26c2d".into(),
                slug: Some("breakfast".into()),
            }],
        );
        relations.parts.insert(
            10,
            vec![RecipeIngredientView {
                id: 5,
                name: "flour".into(),
                measurement_unit: "g".into(),
                amount: 200,
            }],
        );

        let view = RecipeView::new(&recipe(10, 2), &relations, &requester(1), "/media/").unwrap();
        let value = serde_json::to_value(&view).unwrap();

        assert_eq!(value["image"], "/media/recipes/images/10.png");
        assert_eq!(value["author"]["is_subscribed"], true);
        assert_eq!(value["tags"][0]["slug"], "breakfast");
        assert_eq!(value["ingredients"][0]["amount"], 200);
        assert_eq!(value["is_favorited"], true);
        assert_eq!(value["is_in_shopping_cart"], false);
    }

    #[test]
    fn missing_author_is_an_error() {
        let result = RecipeView::new(
            &recipe(10, 99),
            &RecipeRelations::default(),
            &RequesterContext::anonymous(),
            "/media/",
        );
        assert!(result.is_err());
    }

    #[test]
    fn short_recipe_and_author_views() {
        let short = RecipeShortView::new(&recipe(3, 2), "/media");
        assert_eq!(short.image, "/media/recipes/images/3.png");

        let author = AuthorView::new(&user(2), &RequesterContext::anonymous(), vec![short], 4);
        let value = serde_json::to_value(&author).unwrap();
        assert_eq!(value["recipes_count"], 4);
        assert_eq!(value["recipes"][0]["cooking_time"], 30);
        assert_eq!(value["is_subscribed"], false);
    }
}
