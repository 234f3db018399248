use serde::Deserialize;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::ApiError,
    filters::IngredientFilter,
    schema::{Ingredient, Uuid},
};

/// One record of an ingredient import file.
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

pub async fn list_ingredients(
    filter: &IngredientFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM ingredients");
    filter.push_where(&mut builder);
    builder.push(" ORDER BY name, id");

    let list: Vec<Ingredient> = builder.build_query_as().fetch_all(pool).await?;
    Ok(list)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Inserts the records in one transaction, skipping (name, unit) pairs that already exist.
/// Returns how many rows were added.
pub async fn import_ingredients(
    records: &[IngredientRecord],
    pool: &Pool<Postgres>,
) -> Result<u64, ApiError> {
    let mut tr = pool.begin().await?;
    let mut inserted = 0;

    for record in records {
        let name = record.name.trim();
        let unit = record.measurement_unit.trim();
        if name.is_empty() || unit.is_empty() {
            log::warn!("Skipping ingredient with empty name or unit: {record:?}");
            continue;
        }

        let result = sqlx::query(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(name)
        .bind(unit)
        .execute(&mut *tr)
        .await?;
        inserted += result.rows_affected();
    }

    tr.commit().await?;
    Ok(inserted)
}
