use sqlx::{Pool, Postgres};

use crate::{
    error::{is_unique_violation, ApiError},
    schema::{Tag, Uuid},
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, ApiError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

/// Inserts a tag. The color is expected to be normalized already.
pub async fn create_tag(
    name: &str,
    slug: &str,
    color: &str,
    pool: &Pool<Postgres>,
) -> Result<Tag, ApiError> {
    let tag: Tag =
        sqlx::query_as("INSERT INTO tags (name, slug, color) VALUES ($1, $2, $3) RETURNING *")
            .bind(name)
            .bind(slug)
            .bind(color)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::bad_request(format!("Tag '{name}' or slug '{slug}' already exists."))
                } else {
                    e.into()
                }
            })?;

    Ok(tag)
}
