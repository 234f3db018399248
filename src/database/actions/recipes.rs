use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    error::{is_unique_violation, ApiError, FieldErrors, NON_FIELD_ERRORS},
    filters::RecipeFilter,
    form::{IngredientEntry, RecipeForm},
    pagination::PageRequest,
    schema::{AuthorRecipeCount, Recipe, RecipePart, RecipeTag, Uuid},
    validation::{validate_id, Entity, IdError},
};

const DUPLICATE_NAME: &str = "You already have a recipe with this name.";

fn duplicate_name(error: sqlx::Error) -> ApiError {
    if is_unique_violation(&error) {
        return ApiError::validation(NON_FIELD_ERRORS, DUPLICATE_NAME);
    }
    error.into()
}

fn missing(field: &str) -> ApiError {
    ApiError::validation(field, "This field is required.")
}

/// One page of recipes matching the filter, newest first, with the total match count.
pub async fn list_recipes(
    filter: &RecipeFilter,
    request: PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Recipe>, i64), ApiError> {
    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r");
    filter.push_where(&mut count_builder);
    let total: (i64,) = count_builder.build_query_as().fetch_one(pool).await?;
    request.check(total.0)?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT r.* FROM recipes r");
    filter.push_where(&mut builder);
    builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(request.page_size)
        .push(" OFFSET ")
        .push_bind(request.offset());

    let rows: Vec<Recipe> = builder.build_query_as().fetch_all(pool).await?;
    Ok((rows, total.0))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn list_recipe_tags(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeTag>, ApiError> {
    let rows: Vec<RecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
        ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_recipe_parts(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipePart>, ApiError> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT a.recipe_id, i.id, i.name, i.measurement_unit, a.amount
        FROM ingredient_amounts a
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE a.recipe_id = ANY($1)
        ORDER BY a.id
        ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The newest `limit` recipes of each given author.
pub async fn list_author_recipes(
    author_ids: &[Uuid],
    limit: i64,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ApiError> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "
        SELECT * FROM (
            SELECT r.*, ROW_NUMBER() OVER (
                PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC
            ) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE position <= $2
        ORDER BY author_id, position
        ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn count_author_recipes(
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<AuthorRecipeCount>, ApiError> {
    let rows: Vec<AuthorRecipeCount> = sqlx::query_as(
        "
        SELECT author_id, COUNT(*) AS count
        FROM recipes
        WHERE author_id = ANY($1)
        GROUP BY author_id
        ",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Checks everything in the payload that needs the database: referenced tags
/// and ingredients exist and the (name, author) pair is free.
/// Unknown tags are field errors, unknown ingredients are `NotFound`.
/// Returns the tag ids when tags were given.
pub async fn validate_recipe_refs(
    form: &RecipeForm,
    author_id: Uuid,
    recipe_id: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Option<Vec<Uuid>>, ApiError> {
    let mut errors = FieldErrors::new();

    let tags = match &form.tags {
        Some(values) => {
            let mut ids = Vec::with_capacity(values.len());
            for value in values {
                match validate_id(value, Some(Entity::Tag), pool).await {
                    Ok(id) if !ids.contains(&id) => ids.push(id),
                    Ok(_) => {}
                    Err(IdError::Database(e)) => return Err(e.into()),
                    Err(e) => errors.add("tags", e.to_string()),
                }
            }
            Some(ids)
        }
        None => None,
    };

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    for entry in form.ingredients.iter().flatten() {
        if !Entity::Ingredient.exists(entry.id, pool).await? {
            log::debug!("Recipe references missing ingredient {}", entry.id);
            return Err(ApiError::NotFound);
        }
    }

    if let Some(name) = &form.name {
        let taken: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM recipes WHERE name = $1 AND author_id = $2 AND id IS DISTINCT FROM $3)",
        )
        .bind(name)
        .bind(author_id)
        .bind(recipe_id)
        .fetch_one(pool)
        .await?;
        if taken.0 {
            errors.add(NON_FIELD_ERRORS, DUPLICATE_NAME);
        }
    }

    errors.into_result()?;
    Ok(tags)
}

async fn replace_tags(
    recipe_id: Uuid,
    tags: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await?;

    let unique: HashSet<&Uuid> = tags.iter().collect();
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    builder.push_values(unique, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    builder.build().execute(&mut **tr).await?;

    Ok(())
}

async fn replace_ingredients(
    recipe_id: Uuid,
    ingredients: &[IngredientEntry],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM ingredient_amounts WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) ");
    builder.push_values(ingredients, |mut b, entry| {
        b.push_bind(recipe_id)
            .push_bind(entry.id)
            .push_bind(entry.amount);
    });
    builder.build().execute(&mut **tr).await?;

    Ok(())
}

/// Inserts the recipe with its tags and ingredient amounts in one transaction.
/// `image` is the stored path of the already saved image.
pub async fn create_recipe(
    author_id: Uuid,
    form: &RecipeForm,
    image: &str,
    tags: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let name = form.name.as_deref().ok_or_else(|| missing("name"))?;
    let text = form.text.as_deref().ok_or_else(|| missing("text"))?;
    let cooking_time = form.cooking_time.ok_or_else(|| missing("cooking_time"))?;
    let ingredients = form
        .ingredients
        .as_deref()
        .filter(|i| !i.is_empty())
        .ok_or_else(|| missing("ingredients"))?;
    if tags.is_empty() {
        return Err(missing("tags"));
    }

    let mut tr = pool.begin().await?;

    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(author_id)
    .bind(name)
    .bind(text)
    .bind(cooking_time)
    .bind(image)
    .fetch_one(&mut *tr)
    .await
    .map_err(duplicate_name)?;

    replace_tags(recipe.id, tags, &mut tr).await?;
    replace_ingredients(recipe.id, ingredients, &mut tr).await?;

    tr.commit().await?;
    log::info!("User {author_id} created recipe {} ({})", recipe.name, recipe.id);
    Ok(recipe)
}

/// Applies the given fields. Tags and ingredients are only rewritten when a
/// non-empty list was supplied.
pub async fn update_recipe(
    recipe_id: Uuid,
    form: &RecipeForm,
    image: Option<&str>,
    tags: Option<&[Uuid]>,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let mut tr = pool.begin().await?;

    let recipe: Recipe = sqlx::query_as(
        "
        UPDATE recipes
        SET name = COALESCE($2, name),
            text = COALESCE($3, text),
            cooking_time = COALESCE($4, cooking_time),
            image = COALESCE($5, image)
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(recipe_id)
    .bind(form.name.as_deref())
    .bind(form.text.as_deref())
    .bind(form.cooking_time)
    .bind(image)
    .fetch_one(&mut *tr)
    .await
    .map_err(duplicate_name)?;

    if let Some(tags) = tags.filter(|t| !t.is_empty()) {
        replace_tags(recipe.id, tags, &mut tr).await?;
    }
    if let Some(ingredients) = form.ingredients.as_deref().filter(|i| !i.is_empty()) {
        replace_ingredients(recipe.id, ingredients, &mut tr).await?;
    }

    tr.commit().await?;
    Ok(recipe)
}

/// Deletes the recipe and returns the stored image path so the file can be removed.
pub async fn delete_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<String>, ApiError> {
    let row: Option<(String,)> = sqlx::query_as("DELETE FROM recipes WHERE id = $1 RETURNING image")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.0))
}

/// Stored image paths of every recipe by the author.
pub async fn list_author_images(author_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<String>, ApiError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT image FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}
