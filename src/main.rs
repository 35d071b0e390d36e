use call_genie::config::Config;
use call_genie::error::StartupError;

use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

fn init_tracing(level: LevelFilter) -> Result<(), StartupError> {
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(Targets::new().with_targets([
            ("hyper", LevelFilter::OFF),
            ("sqlx", LevelFilter::WARN),
            ("tower_http", level),
            ("call_genie", level),
        ]));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // a missing .env is fine; the environment may already be populated
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(config.log_level)?;

    let app_state = call_genie::build_state(&config).await?;
    call_genie::serve(&config, app_state).await
}
