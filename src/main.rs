use clap::Parser;
use league_rating_processor::{
    args::{Args, Command},
    database::{db::DbClient, db_structs::MatchResult},
    error::RatingError
};
use serde::Serialize;
use std::process::exit;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_tracing(&args.log_level);

    let Some(connection_string) = args.connection_string.clone() else {
        error!("CONNECTION_STRING environment variable must be set");
        exit(1);
    };

    let client = match DbClient::connect(&connection_string).await {
        Ok(client) => client.with_progress(true),
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            error!("Application cannot start without a valid database connection");
            exit(1);
        }
    };

    if let Err(e) = run(&client, args.command).await {
        error!("{}", e);
        exit(1);
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(client: &DbClient, command: Command) -> Result<(), RatingError> {
    match command {
        Command::Recompute => {
            let summary = client.recompute_all().await?;
            info!(
                "Recomputed ratings: {} matches replayed, {} skipped",
                summary.replayed, summary.skipped
            );
            print_json(&summary);
        }
        Command::Pending => {
            let summary = client.apply_pending().await?;
            print_json(&summary);
        }
        Command::Apply {
            players,
            ranks,
            season,
            date,
            game_number
        } => {
            let result = MatchResult::new(&players, &ranks, season, date, game_number)?;
            let update = client.apply_match(&result).await?;
            print_json(&update.entries);
        }
        Command::Rating { player_id } => {
            let (rating, games) = client.get_rating(player_id).await?;
            print_json(&serde_json::json!({ "player_id": player_id, "rating": rating, "games": games }));
        }
        Command::History { player_id, limit } => {
            print_json(&client.get_history(player_id, limit).await?);
        }
        Command::Leaderboard => {
            print_json(&client.get_leaderboard().await?);
        }
        Command::Status => {
            let status = client.status().await?;
            if status.needs_recompute {
                info!("Ratings are out of date, run `recompute`");
            }
            print_json(&status);
        }
        Command::InitSchema => client.init_schema().await?
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize output: {}", e)
    }
}
