use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchroom_elo::api::{FixtureApi, MatchApi, StaticPreferences};
use matchroom_elo::config::AppConfig;
use matchroom_elo::markup::{resolve_roster, room_id_from_url, RosterView};
use matchroom_elo::models::{DisplayMode, RoomId};
use matchroom_elo::page::MemoryPage;
use matchroom_elo::pipeline::{EstimationPipeline, PipelineOutcome};
use matchroom_elo::predict::{estimate_rating_change, predict_from_win_probability};

#[derive(Parser)]
#[command(name = "matchroom-elo")]
#[command(about = "Live rating-change estimation for competitive match rooms")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the estimation pipeline against a fixture file
    Estimate {
        /// Fixture JSON (match payload + participant records)
        #[arg(long)]
        fixture: PathBuf,

        /// Saved match-room markup snapshot; roster and display mode are
        /// resolved from it instead of the match payload
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Room id, or a match-room URL to extract it from
        #[arg(long)]
        room: String,

        /// Suppress estimation on matches the viewer plays in
        #[arg(long)]
        focus_mode: bool,
    },

    /// One-shot curve query
    Predict {
        /// Own faction average rating
        #[arg(long)]
        own: Option<i64>,

        /// Opponent faction average rating
        #[arg(long)]
        opponent: Option<i64>,

        /// Host-supplied win probability (0..=1); overrides the averages
        #[arg(long)]
        win_probability: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = load_config(&cli.config);

    match cli.command {
        Commands::Estimate {
            fixture,
            snapshot,
            room,
            focus_mode,
        } => {
            let room_id = room_id_from_url(&room).unwrap_or_else(|| RoomId::from(room.as_str()));

            let api = FixtureApi::from_file(&fixture)
                .with_context(|| format!("loading fixture {}", fixture.display()))?;

            let roster = match snapshot {
                Some(path) => {
                    let html = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading snapshot {}", path.display()))?;
                    resolve_roster(&html)
                        .context("snapshot does not contain two team sections")?
                }
                None => {
                    let room = api
                        .fetch_match(&room_id)
                        .await?
                        .context("fixture does not contain the requested room")?;
                    RosterView::from_match(&room, DisplayMode::Modern)
                }
            };

            let preferences = StaticPreferences {
                focus_mode: focus_mode || config.focus_mode,
            };
            let pipeline = EstimationPipeline::new(api, preferences, config.curve);
            let page = Arc::new(MemoryPage::with_standard_targets("0", "0"));

            let outcome = pipeline.run(&room_id, &roster, page.clone(), None).await;

            match outcome {
                PipelineOutcome::Estimated { estimates, .. } => {
                    for est in estimates {
                        println!(
                            "{:<10} avg {:>5}  diff {:>5}  est. gain +{} / loss -{}  [{}]",
                            est.average.name,
                            est.average.average_rating,
                            est.diff_label(),
                            est.estimate.gain,
                            est.estimate.loss,
                            match est.source {
                                matchroom_elo::models::EstimateSource::WinProbability => {
                                    "win probability"
                                }
                                matchroom_elo::models::EstimateSource::RatingDifference => {
                                    "rating difference"
                                }
                            }
                        );
                    }
                }
                PipelineOutcome::Skipped(reason) => {
                    println!("no estimate: {:?}", reason);
                }
            }
        }

        Commands::Predict {
            own,
            opponent,
            win_probability,
        } => {
            let estimate = match (win_probability, own, opponent) {
                (Some(p), _, _) => predict_from_win_probability(p, &config.curve),
                (None, Some(own), Some(opponent)) => {
                    estimate_rating_change(own, opponent, &config.curve)
                }
                _ => bail!("provide --win-probability, or both --own and --opponent"),
            };

            println!("est. gain +{} / loss -{}", estimate.gain, estimate.loss);
        }
    }

    Ok(())
}

fn load_config(path: &str) -> AppConfig {
    let path_buf = PathBuf::from(path);
    if path_buf.exists() {
        match AppConfig::from_file(&path_buf) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to load {}: {}; using defaults", path, err);
                AppConfig::default()
            }
        }
    } else {
        AppConfig::default()
    }
}
