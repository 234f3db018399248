use std::{convert::Infallible, sync::Arc};

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use warp::Filter;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub async fn connect(config: Config) -> Result<Self, sqlx::Error> {
        log::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self::new(pool, config))
    }

    /// State whose pool only connects on first use.
    pub fn lazy(config: Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect_lazy(&config.database_url)?;

        Ok(Self::new(pool, config))
    }
}

pub fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
