use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "chain-view-cli")]
#[command(about = "Management CLI for the chain-view poller", long_about = None)]
struct Cli {
    /// Base URL of the admin server.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check liveness and version
    Status,
    /// List pools with breaker state and per-endpoint counters
    Pools,
    /// Change the log filter, e.g. `debug` or `chain_view=trace,info`
    Level { level: String },
    /// Send one request through a pool using its pooling strategy
    Dispatch {
        network: String,
        /// JSON body to POST; without it the configured probe is sent
        #[arg(short, long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/healthz/health", base)).send().await?,
        Commands::Pools => client.get(format!("{}/healthz/pools", base)).send().await?,
        Commands::Level { level } => {
            client
                .post(format!("{}/healthz/level", base))
                .json(&json!({ "level": level }))
                .send()
                .await?
        }
        Commands::Dispatch { network, body } => {
            client
                .post(format!("{}/healthz/pools/{}/dispatch", base, network))
                .body(body.unwrap_or_default())
                .send()
                .await?
        }
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
