use std::sync::Arc;
use support_desk_router::{api::start_server, RouterConfig, TurnRouter};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RouterConfig::from_env()?;

    let router = match TurnRouter::from_config(&config) {
        Ok(router) => router,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Set OPENAI_API_KEY (see .env.example) before starting the server");
            return Err(Box::new(e) as Box<dyn std::error::Error>);
        }
    };

    info!("Support Desk Router - API Server");
    info!("Port: {}", config.port);
    info!("Contract policy: {:?}", config.contract_policy);

    start_server(Arc::new(router), config.port).await?;

    Ok(())
}
