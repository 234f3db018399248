use std::collections::BTreeMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::ApiError,
    schema::{CartPart, ShoppingListEntry, Uuid},
};

pub async fn list_cart_parts(user_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<CartPart>, ApiError> {
    let rows: Vec<CartPart> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, a.amount
        FROM shopping_cart c
        INNER JOIN ingredient_amounts a ON a.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE c.user_id = $1
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn cart_is_empty(user_id: Uuid, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let row: (bool,) =
        sqlx::query_as("SELECT NOT EXISTS (SELECT 1 FROM shopping_cart WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(row.0)
}

/// Sums amounts per (name, unit), ordered by ingredient name regardless of case.
pub fn aggregate(parts: Vec<CartPart>) -> Vec<ShoppingListEntry> {
    let mut totals: BTreeMap<(String, String, String), i64> = BTreeMap::new();
    for part in parts {
        *totals
            .entry((part.name.to_lowercase(), part.name, part.measurement_unit))
            .or_default() += i64::from(part.amount);
    }

    totals
        .into_iter()
        .map(|((_, name, measurement_unit), amount)| ShoppingListEntry {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, unit: &str, amount: i32) -> CartPart {
        CartPart {
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }

    #[test]
    fn sums_same_ingredient_and_unit() {
        let list = aggregate(vec![part("flour", "g", 100), part("flour", "g", 50)]);
        assert_eq!(
            list,
            vec![ShoppingListEntry {
                name: "flour".into(),
                measurement_unit: "g".into(),
                amount: 150,
            }]
        );
    }

    #[test]
    fn keeps_units_apart_and_sorts_by_name() {
        let list = aggregate(vec![
            part("sugar", "g", 10),
            part("eggs", "pcs", 2),
            part("sugar", "tbsp", 1),
            part("eggs", "pcs", 3),
        ]);
        let rows: Vec<(&str, &str, i64)> = list
            .iter()
            .map(|e| (e.name.as_str(), e.measurement_unit.as_str(), e.amount))
            .collect();
        assert_eq!(
            rows,
            vec![("eggs", "pcs", 5), ("sugar", "g", 10), ("sugar", "tbsp", 1)]
        );
    }

    #[test]
    fn capitalized_names_sort_alphabetically() {
        let list = aggregate(vec![
            part("Zucchini", "pcs", 1),
            part("apple", "pcs", 2),
            part("Butter", "g", 50),
        ]);
        let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "Butter", "Zucchini"]);
    }

    #[test]
    fn empty_cart_gives_empty_list() {
        assert!(aggregate(Vec::new()).is_empty());
    }
}
