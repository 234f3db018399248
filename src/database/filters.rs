use sqlx::{Postgres, QueryBuilder};

use super::{error::ApiError, form::QueryParams, schema::Uuid};

/// Escapes `%`, `_` and the escape character itself for use inside a LIKE pattern.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `?name=` prefix search over ingredient names, case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientFilter {
    pub name: Option<String>,
}

impl IngredientFilter {
    pub fn from_query(params: &QueryParams) -> Self {
        Self {
            name: params
                .get("name")
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned),
        }
    }

    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Some(name) = &self.name {
            builder
                .push(" WHERE LOWER(name) LIKE ")
                .push_bind(format!("{}%", escape_like(&name.to_lowercase())))
                .push(" ESCAPE '\\'");
        }
    }
}

/// Recipe list filters. Every given filter narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub requester: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
}

impl RecipeFilter {
    pub fn from_query(params: &QueryParams, requester: Option<Uuid>) -> Result<Self, ApiError> {
        Ok(Self {
            requester,
            is_favorited: params.get_bool("is_favorited")?.unwrap_or(false),
            is_in_shopping_cart: params.get_bool("is_in_shopping_cart")?.unwrap_or(false),
            author: params.get_number("author")?,
            tags: params.get_all("tags"),
        })
    }

    /// Appends the WHERE clause for recipes aliased as `r`.
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        let mut conditions = 0;
        let mut next = |builder: &mut QueryBuilder<'_, Postgres>| {
            builder.push(if conditions == 0 { " WHERE " } else { " AND " });
            conditions += 1;
        };

        if self.is_favorited || self.is_in_shopping_cart {
            // Only the requester's own rows can match; anonymous callers see nothing.
            let Some(user_id) = self.requester else {
                next(builder);
                builder.push("FALSE");
                return;
            };

            if self.is_favorited {
                next(builder);
                builder
                    .push("r.id IN (SELECT recipe_id FROM favorites WHERE user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
            if self.is_in_shopping_cart {
                next(builder);
                builder
                    .push("r.id IN (SELECT recipe_id FROM shopping_cart WHERE user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
        }

        if let Some(author) = self.author {
            next(builder);
            builder.push("r.author_id = ").push_bind(author);
        }

        if !self.tags.is_empty() {
            next(builder);
            builder
                .push(
                    "r.id IN (SELECT rt.recipe_id FROM recipe_tags rt \
                     INNER JOIN tags t ON t.id = rt.tag_id WHERE t.slug = ANY(",
                )
                .push_bind(self.tags.clone())
                .push("))");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn recipe_sql(filter: &RecipeFilter) -> String {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT r.* FROM recipes r");
        filter.push_where(&mut builder);
        builder.sql().to_owned()
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("sugar"), "sugar");
    }

    #[test]
    fn ingredient_prefix_search() {
        let filter = IngredientFilter::from_query(&params(&[("name", "  Sug ")]));
        assert_eq!(filter.name.as_deref(), Some("Sug"));

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM ingredients");
        filter.push_where(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT * FROM ingredients WHERE LOWER(name) LIKE $1 ESCAPE '\\'"
        );
    }

    #[test]
    fn empty_ingredient_filter_adds_nothing() {
        let filter = IngredientFilter::from_query(&params(&[("name", "")]));
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM ingredients");
        filter.push_where(&mut builder);
        assert_eq!(builder.sql(), "SELECT * FROM ingredients");
    }

    #[test]
    fn no_filters_means_no_where() {
        let filter = RecipeFilter::from_query(&params(&[]), Some(1)).unwrap();
        assert_eq!(recipe_sql(&filter), "SELECT r.* FROM recipes r");
    }

    #[test]
    fn false_flags_do_not_restrict() {
        let filter = RecipeFilter::from_query(
            &params(&[("is_favorited", "0"), ("is_in_shopping_cart", "false")]),
            Some(1),
        )
        .unwrap();
        assert_eq!(recipe_sql(&filter), "SELECT r.* FROM recipes r");
    }

    #[test]
    fn filters_are_combined() {
        let filter = RecipeFilter::from_query(
            &params(&[
                ("is_favorited", "1"),
                ("author", "3"),
                ("tags", "breakfast"),
                ("tags", "lunch"),
            ]),
            Some(7),
        )
        .unwrap();
        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);

        let sql = recipe_sql(&filter);
        assert!(sql.contains(" WHERE r.id IN (SELECT recipe_id FROM favorites WHERE user_id = $1)"));
        assert!(sql.contains(" AND r.author_id = $2"));
        assert!(sql.contains("t.slug = ANY($3))"));
    }

    #[test]
    fn anonymous_favorites_match_nothing() {
        let filter =
            RecipeFilter::from_query(&params(&[("is_in_shopping_cart", "true")]), None).unwrap();
        assert_eq!(recipe_sql(&filter), "SELECT r.* FROM recipes r WHERE FALSE");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RecipeFilter::from_query(&params(&[("is_favorited", "maybe")]), None).is_err());
        assert!(RecipeFilter::from_query(&params(&[("author", "abc")]), None).is_err());
    }
}
