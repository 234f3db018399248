use std::{net::SocketAddr, path::Path};

use sqlx::{Pool, Postgres};
use thiserror::Error;

use crate::{
    actions::{create_tag, create_user, import_ingredients, IngredientRecord},
    api::routes::routes,
    config::{Config, ConfigError},
    cryptography::generate_password,
    error::ApiError,
    form::UserForm,
    state::AppState,
    validation::{normalize_hex_color, validate_email, validate_username},
};

const GENERATED_PASSWORD_LENGTH: usize = 16;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid bind address '{0}'")]
    Bind(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid ingredient file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("{}", describe(.0))]
    Api(ApiError),
}

fn describe(error: &ApiError) -> String {
    match error {
        ApiError::Validation(errors) => serde_json::to_string(errors).unwrap_or_default(),
        other => other.to_string(),
    }
}

impl From<ApiError> for CommandError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::Database(e) => CommandError::Database(e),
            other => CommandError::Api(other),
        }
    }
}

pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), CommandError> {
    log::info!("Applying migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Migrations applied");
    Ok(())
}

pub async fn serve(config: Config) -> Result<(), CommandError> {
    let addr: SocketAddr = config
        .bind
        .parse()
        .map_err(|_| CommandError::Bind(config.bind.clone()))?;
    for warning in config.warnings() {
        log::warn!("{warning}");
    }

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .map_err(|source| CommandError::Io {
            path: config.media_root.display().to_string(),
            source,
        })?;

    let state = AppState::connect(config).await?;
    migrate(&state.pool).await?;

    log::info!("Listening on http://{addr}");
    warp::serve(routes(state)).run(addr).await;
    Ok(())
}

/// Parses a JSON array of `{name, measurement_unit}` records.
pub fn parse_ingredients(data: &str) -> Result<Vec<IngredientRecord>, CommandError> {
    Ok(serde_json::from_str(data)?)
}

pub async fn load_ingredients(path: &Path, pool: &Pool<Postgres>) -> Result<u64, CommandError> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let records = parse_ingredients(&data)?;

    let inserted = import_ingredients(&records, pool).await?;
    log::info!(
        "Loaded {inserted} new ingredients from {} ({} records)",
        path.display(),
        records.len()
    );
    Ok(inserted)
}

pub async fn add_tag(
    name: &str,
    slug: &str,
    color: &str,
    pool: &Pool<Postgres>,
) -> Result<(), CommandError> {
    let color = normalize_hex_color(color).map_err(CommandError::Invalid)?;
    let tag = create_tag(name.trim(), slug.trim(), &color, pool).await?;

    log::info!("Created tag {} ({}) with color {}", tag.name, tag.id, tag.color);
    Ok(())
}

/// Creates a superuser. Returns the password, generated when none was given.
pub async fn create_admin(
    email: &str,
    username: &str,
    password: Option<String>,
    pool: &Pool<Postgres>,
) -> Result<String, CommandError> {
    let password = password.unwrap_or_else(|| generate_password(GENERATED_PASSWORD_LENGTH));
    let form = UserForm {
        email: validate_email(email).map_err(CommandError::Invalid)?,
        username: validate_username(username).map_err(CommandError::Invalid)?,
        first_name: String::new(),
        last_name: String::new(),
        password,
    };

    let user = create_user(&form, true, pool).await?;
    log::info!("Created administrator {} ({})", user.username, user.id);
    Ok(form.password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingredient_file_format() {
        let records = parse_ingredients(
            r#"[{"name": "flour", "measurement_unit": "g"}, {"name": "eggs", "measurement_unit": "pcs"}]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "eggs");
        assert_eq!(records[1].measurement_unit, "pcs");
    }

    #[test]
    fn malformed_ingredient_file_is_rejected() {
        assert!(matches!(
            parse_ingredients(r#"{"name": "flour"}"#),
            Err(CommandError::Json(_))
        ));
    }

    #[test]
    fn seed_file_parses() {
        let data = include_str!("../data/ingredients.json");
        assert!(!parse_ingredients(data).unwrap().is_empty());
    }

    #[test]
    fn validation_errors_are_readable() {
        let error = CommandError::from(ApiError::validation("email", "Already taken."));
        assert_eq!(error.to_string(), r#"{"email":["Already taken."]}"#);
    }
}
