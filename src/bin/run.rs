//! Operator entry point (§6): a single invocation that drains pending
//! tips, wakes and calls the Processing Worker, persists results, and
//! (unless `--no-promotion`) rebuilds promotions for every touched
//! location. Exit codes: 0 success, 1 `PipelineAborted`, 2 unhandled or
//! setup error.

use clap::Parser;
use tracing::{error, info};

use tripwhisper::config::Config;
use tripwhisper::coordinator::{self, CoordinatorError};
use tripwhisper::domain::LocationId;
use tripwhisper::gateway::postgres::{PoolConfig, PostgresGateway};

#[derive(Parser, Debug)]
#[command(name = "tripwhisper-run")]
#[command(about = "Drain pending traveler tips, translate/embed via the worker, and promote consensus tips per location")]
struct Args {
    /// Skip the wake protocol; fail immediately if the worker is not
    /// already reachable (§6).
    #[arg(long)]
    no_wake: bool,

    /// Skip the Promotion Engine at the end of the run (§6).
    #[arg(long)]
    no_promotion: bool,

    /// Restrict this run to a single location, for manual reruns.
    #[arg(long)]
    location_id: Option<i64>,
}

const EXIT_SUCCESS: i32 = 0;
const EXIT_PIPELINE_ABORTED: i32 = 1;
const EXIT_SETUP_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(EXIT_SETUP_ERROR);
        }
    };
    if args.no_wake {
        config.wake_enabled = false;
    }

    let gateway = match PostgresGateway::connect(&config.database_url, PoolConfig::default()).await
    {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            std::process::exit(EXIT_SETUP_ERROR);
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(gateway.pool()).await {
        error!(error = %e, "failed to apply migrations");
        std::process::exit(EXIT_SETUP_ERROR);
    }

    info!("starting tripwhisper run");

    let location_filter = args.location_id.map(LocationId);

    match coordinator::run_once(&gateway, &config, !args.no_promotion, location_filter).await {
        Ok(summary) => {
            info!(
                claimed = summary.claimed,
                processed = summary.processed,
                failed = summary.failed,
                locations_promoted = summary.locations_promoted,
                aborted = summary.aborted,
                "run complete"
            );
            std::process::exit(EXIT_SUCCESS);
        }
        Err(CoordinatorError::PipelineAborted) => {
            error!("worker unavailable; claimed tips reverted to pending");
            std::process::exit(EXIT_PIPELINE_ABORTED);
        }
        Err(e) => {
            error!(error = %e, "run failed");
            std::process::exit(EXIT_SETUP_ERROR);
        }
    }
}
