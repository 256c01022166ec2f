//! Application entry point for cms-forms.
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use cms_forms::config::Config;
use cms_forms::logging::setup_logging;
use cms_forms::mail::LogMailer;
use cms_forms::repository::Repository;
use cms_forms::router::Request;
use cms_forms::router::Response;
use cms_forms::router::Router;
use cms_forms::service::Services;
use cms_forms::service::subscription_service::UuidTokenGenerator;
use dotenv::dotenv;
use log::debug;
use log::info;
use log::warn;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let config = load_config()?;
    let db = setup_database(&config, init_start).await?;
    let router = setup_router(&config, db.clone())?;

    info!(
        "cms-forms is up in {:.2}s. Reading requests from stdin.",
        init_start.elapsed().as_secs_f64()
    );
    run(&router).await?;

    db.close().await;
    info!("Input closed, shutting down.");
    Ok(())
}

fn load_config() -> Result<Arc<Config>> {
    let mut config = Config::new();
    config.load()?;
    setup_logging(&config)?;
    info!("Starting cms-forms...");
    Ok(Arc::new(config))
}

async fn setup_database(config: &Config, init_start: Instant) -> Result<Arc<Repository>> {
    debug!("Setting up Database...");
    let db = Arc::new(Repository::new(&config.db_url, &config.db_path).await?);

    info!("Running database migrations...");
    db.run_migrations().await?;
    info!(
        "Database setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(db)
}

fn setup_router(config: &Config, db: Arc<Repository>) -> Result<Router> {
    debug!("Setting up Services...");
    let services = Services::new(
        db,
        config,
        Arc::new(UuidTokenGenerator),
        Arc::new(LogMailer),
    )?;
    Ok(Router::new(Arc::new(services), config))
}

async fn run(router: &Router) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => router.handle(request).await,
            Err(e) => {
                warn!("Rejected malformed request: {e}");
                Response::Error {
                    message: format!("Malformed request: {e}"),
                }
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    Ok(())
}
