use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "telemetry-cli")]
#[command(about = "Query a running telemetry hub exporter", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:9464")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show event hub stats (subscribers, queue depth, batch, rate limit)
    Stats,
    /// Print metrics in text exposition format
    Metrics,
    /// Print the metrics snapshot as JSON
    Json,
    /// Check exporter health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Stats => {
            let res = client.get(format!("{}/stats", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            if check_status(&res) {
                print!("{}", res.text().await?);
            }
        }
        Commands::Json => {
            let res = client.get(format!("{}/metrics/json", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_json(res).await?;
        }
    }

    Ok(())
}

fn check_status(res: &reqwest::Response) -> bool {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: exporter returned status {}", status);
        return false;
    }
    true
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !check_status(&res) {
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
