use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use api_gatekeeper::signature::{AesGcmEnvelope, EnvelopeCipher};

#[derive(Parser)]
#[command(name = "gatekeeper-cli")]
#[command(about = "Management CLI for api-gatekeeper", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gatekeeper status and store backends
    Status,
    /// Show the active configuration (secrets masked)
    Config,
    /// Inspect the bucket of a limiting key
    Inspect {
        /// Limiting key, e.g. `ip:203.0.113.7`
        limit_key: String,
        /// Resolve the rule for this path instead of the default
        #[arg(long)]
        path: Option<String>,
    },
    /// Reset a limiting key under every rule
    Reset { limit_key: String },
    /// Drop every rate limit bucket
    ClearLimits,
    /// Show one-time signature records
    ReplayStats,
    /// Drop every one-time signature record
    ReplayClear,
    /// Sweep expired records and buckets now
    ReplaySweep,
    /// Produce an encrypted signature envelope locally
    Sign {
        /// Envelope key (same as `signature.encryption_key`)
        #[arg(long)]
        secret: String,
        /// Plaintext; must contain the configured marker to be accepted
        #[arg(long)]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Config => client.get(format!("{base}/admin/config")),
        Commands::Inspect { limit_key, path } => {
            let mut query = vec![("key", limit_key)];
            if let Some(path) = path {
                query.push(("path", path));
            }
            client
                .get(format!("{base}/admin/rate-limit/inspect"))
                .query(&query)
        }
        Commands::Reset { limit_key } => client
            .post(format!("{base}/admin/rate-limit/reset"))
            .json(&json!({ "key": limit_key })),
        Commands::ClearLimits => client.post(format!("{base}/admin/rate-limit/clear")),
        Commands::ReplayStats => client.get(format!("{base}/admin/replay/stats")),
        Commands::ReplayClear => client.post(format!("{base}/admin/replay/clear")),
        Commands::ReplaySweep => client.post(format!("{base}/admin/replay/sweep")),
        Commands::Sign { secret, payload } => {
            println!("{}", AesGcmEnvelope.seal(&payload, &secret)?);
            return Ok(());
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
