use chrono::Duration;
use clap::{Parser, Subcommand};
use realvsai::assets::AssetDir;
use realvsai::config::Config;
use realvsai::db::Db;
use realvsai::models::{Difficulty, GameMode};
use realvsai::services::score::{Expected, ScoreSigner};
use realvsai::{ActionResult, AppState, RequestContext};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// libSQL server address, or `file:path` for a local database
    #[clap(env = "DATABASE_URL")]
    url: String,

    /// libSQL authentication token.
    #[clap(long, env, default_value = "")]
    auth_token: String,

    /// Directory holding the `real/` and `ai/` image folders.
    #[arg(long, env, default_value = "static/images")]
    assets: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations and exit.
    Migrate,

    /// Delete games not touched for the given number of days.
    Cleanup {
        #[arg(long)]
        days: Option<i64>,
    },

    /// Fill lobbies whose wait timeout passed with bots.
    BackfillBots,

    /// Check a signed score token.
    VerifyScore {
        token: String,
        #[arg(long)]
        score: Option<i64>,
        #[arg(long)]
        user_id: Option<i64>,
    },

    /// Print the top scores of a mode.
    Leaderboard {
        #[arg(long, default_value = "single")]
        mode: GameMode,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "realvsai=debug".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    let config = Config::default();
    let signer = ScoreSigner::from_env(config.score_token_max_age);
    let db = Db::new(args.url, args.auth_token).await?;
    let state = AppState::new(db, config, signer, AssetDir::new(args.assets));
    let mut ctx = RequestContext::guest();

    match args.command {
        Command::Migrate => {
            tracing::info!("database is up to date");
        }
        Command::Cleanup { days } => {
            let retention = days.map(Duration::days).unwrap_or(state.config.retention);
            let cutoff = ctx.now - retention;
            let result = ActionResult::from(state.games().cleanup_games(cutoff).await);
            print_json(&result)?;
        }
        Command::BackfillBots => {
            let result = ActionResult::from(state.multiplayer().backfill_expired(&mut ctx).await);
            print_json(&result)?;
        }
        Command::VerifyScore {
            token,
            score,
            user_id,
        } => {
            let expected = Expected { score, user_id };
            let result = ActionResult::from(state.games().verify_score(&ctx, &token, expected).await);
            print_json(&result)?;
        }
        Command::Leaderboard {
            mode,
            difficulty,
            limit,
        } => {
            let entries = state.db.top_scores(mode, difficulty, limit).await?;
            print_json(&entries)?;
        }
    }

    Ok(())
}
