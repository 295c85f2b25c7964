use clap::Parser;
use support_desk_router::{RouterConfig, TurnRouter};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run one support desk turn for a single message
#[derive(Debug, Parser)]
#[command(name = "support-router", version)]
struct Cli {
    /// Use the keyword-scoring offline service instead of the API
    #[arg(long)]
    offline: bool,

    /// Print the full turn outcome as JSON
    #[arg(long)]
    json: bool,

    /// Message text; read from stdin when omitted
    message: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RouterConfig::from_env()?;

    let message = if cli.message.is_empty() {
        let mut input = String::new();
        tokio::io::stdin().read_to_string(&mut input).await?;
        input
    } else {
        cli.message.join(" ")
    };

    let router = if cli.offline {
        info!("Using offline completion service");
        TurnRouter::offline(config.contract_policy)
    } else {
        TurnRouter::from_config(&config)?
    };

    match router.run_turn(&message).await {
        Ok(outcome) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            println!("\n=== TURN RESULT ===");
            println!("Turn ID: {}", outcome.record.turn_id);
            println!(
                "Route: {}",
                outcome
                    .route_decision()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!(
                "Domain: {}",
                outcome
                    .domain_label()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            let trace: Vec<String> = outcome
                .record
                .trace
                .iter()
                .map(|n| format!("{:?}", n).to_lowercase())
                .collect();
            println!("Trace: {}", trace.join(" -> "));
            println!("\n{}", outcome.reply().unwrap_or_default());
            Ok(())
        }
        Err(e) => {
            eprintln!("Turn failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
