use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use foodgram_backend::{
    commands::{self, CommandError},
    config::Config,
    state::AppState,
};

#[derive(Parser, Debug)]
#[command(name = "foodgram", about = "Foodgram recipe sharing backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply migrations and start the HTTP server (default)
    Serve,

    /// Apply pending database migrations
    Migrate,

    /// Import ingredients from a JSON array of {name, measurement_unit}
    LoadIngredients {
        #[arg(value_name = "FILE", default_value = "data/ingredients.json")]
        path: PathBuf,
    },

    /// Create a recipe tag
    CreateTag {
        name: String,
        slug: String,
        /// Hex color, e.g. #e26c2d or fff
        #[arg(default_value = "#ffffff")]
        color: String,
    },

    /// Create an administrator account
    CreateAdmin {
        email: String,
        username: String,
        /// Generated and printed when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

async fn connect(config: Config) -> Result<AppState, CommandError> {
    Ok(AppState::connect(config).await?)
}

async fn run(command: Command) -> Result<(), CommandError> {
    let config = Config::load()?;

    match command {
        Command::Serve => commands::serve(config).await?,
        Command::Migrate => commands::migrate(&connect(config).await?.pool).await?,
        Command::LoadIngredients { path } => {
            let state = connect(config).await?;
            let inserted = commands::load_ingredients(&path, &state.pool).await?;
            println!("Loaded {inserted} ingredients");
        }
        Command::CreateTag { name, slug, color } => {
            let state = connect(config).await?;
            commands::add_tag(&name, &slug, &color, &state.pool).await?
        }
        Command::CreateAdmin {
            email,
            username,
            password,
        } => {
            let state = connect(config).await?;
            let generated = password.is_none();
            let password = commands::create_admin(&email, &username, password, &state.pool).await?;
            if generated {
                println!("Administrator {username} created with password: {password}");
            } else {
                println!("Administrator {username} created");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Command::Serve)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
