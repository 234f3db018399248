use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    error::{is_foreign_key_violation, ApiError},
    schema::Uuid,
    validation::Entity,
};

/// User-owned many-to-many relations that are toggled through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Subscribe,
    Favorite,
    ShoppingCart,
}

impl Relation {
    fn table(self) -> &'static str {
        match self {
            Relation::Subscribe => "subscriptions",
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "shopping_cart",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            Relation::Subscribe => "author_id",
            Relation::Favorite | Relation::ShoppingCart => "recipe_id",
        }
    }

    pub fn target(self) -> Entity {
        match self {
            Relation::Subscribe => Entity::User,
            Relation::Favorite | Relation::ShoppingCart => Entity::Recipe,
        }
    }

    fn already_exists(self) -> &'static str {
        match self {
            Relation::Subscribe => "You are already subscribed to this author.",
            Relation::Favorite => "Recipe is already in favorites.",
            Relation::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    fn not_found(self) -> &'static str {
        match self {
            Relation::Subscribe => "You are not subscribed to this author.",
            Relation::Favorite => "Recipe is not in favorites.",
            Relation::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

/// Direction of a relation toggle: GET/POST add, DELETE removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Add,
    Remove,
}

/// Adds or removes the (user, target) pair. Adding an existing pair or
/// removing a missing one is a bad request.
pub async fn toggle_relation(
    relation: Relation,
    toggle: Toggle,
    user_id: Uuid,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    if !relation.target().exists(target_id, pool).await? {
        return Err(ApiError::NotFound);
    }
    if relation == Relation::Subscribe && user_id == target_id {
        return Err(ApiError::bad_request("You cannot subscribe to yourself."));
    }

    let result = match toggle {
        Toggle::Add => {
            sqlx::query(&format!(
                "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                relation.table(),
                relation.target_column()
            ))
            .bind(user_id)
            .bind(target_id)
            .execute(pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    ApiError::NotFound
                } else {
                    e.into()
                }
            })?
        }
        Toggle::Remove => {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
                relation.table(),
                relation.target_column()
            ))
            .bind(user_id)
            .bind(target_id)
            .execute(pool)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        let message = match toggle {
            Toggle::Add => relation.already_exists(),
            Toggle::Remove => relation.not_found(),
        };
        return Err(ApiError::bad_request(message));
    }

    log::debug!("{toggle:?} {relation:?} user={user_id} target={target_id}");
    Ok(())
}

/// Which of `target_ids` the user is related to.
pub async fn related_ids(
    relation: Relation,
    user_id: Uuid,
    target_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, ApiError> {
    if target_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT {column} FROM {table} WHERE user_id = $1 AND {column} = ANY($2)",
        table = relation.table(),
        column = relation.target_column()
    ))
    .bind(user_id)
    .bind(target_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Relation::Subscribe, "subscriptions", "author_id", Entity::User)]
    #[case(Relation::Favorite, "favorites", "recipe_id", Entity::Recipe)]
    #[case(Relation::ShoppingCart, "shopping_cart", "recipe_id", Entity::Recipe)]
    fn dispatch(
        #[case] relation: Relation,
        #[case] table: &str,
        #[case] column: &str,
        #[case] target: Entity,
    ) {
        assert_eq!(relation.table(), table);
        assert_eq!(relation.target_column(), column);
        assert_eq!(relation.target(), target);
    }
}
