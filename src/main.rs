use std::error::Error;

use ad_metrics_service::{config, logging, server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration
    let config = config::Config::from_env()?;
    logging::init_logging(&config);

    if config.google_developer_token.is_none() {
        info!("GOOGLE_ADS_DEVELOPER_TOKEN not set; Google Ads requests will be refused");
    }

    let bind_address = config.bind_address.clone();
    let app = server::app_router(server::AppState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Ad metrics service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
