use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use water_compliance_client::client::AnalysisClient;
use water_compliance_client::config::Config;
use water_compliance_client::presenter;
use water_compliance_client::session::{SessionState, UploadSession};
use water_compliance_client::upload::SelectedFile;

#[derive(Parser)]
#[command(name = "water-compliance")]
#[command(about = "Upload water-extraction readings and view compliance metrics", long_about = None)]
struct Cli {
    /// Base URL of the analysis service
    #[arg(long, env = "ANALYSIS_API_URL", global = true)]
    endpoint: Option<String>,

    /// Request timeout in seconds (overrides ANALYSIS_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze an .xlsx or .xls spreadsheet of extraction readings
    Analyze {
        /// Spreadsheet to upload
        file: PathBuf,

        /// Re-submit after transport failures or 5xx responses
        #[arg(long, default_value = "0")]
        retries: usize,

        /// Print the result as JSON instead of cards
        #[arg(long)]
        json: bool,

        /// Also list every violating date and year
        #[arg(long)]
        details: bool,
    },
    /// Check that the analysis service is reachable
    Health,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so results on stdout stay pipeable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,water_compliance_client=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env_with_endpoint(cli.endpoint.as_deref())?;
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs.max(1)));
    }
    info!("Using analysis service at {}", config.endpoint);

    let client = AnalysisClient::new(config)?;

    match cli.command {
        Command::Analyze {
            file,
            retries,
            json,
            details,
        } => analyze(client, file, retries, json, details).await,
        Command::Health => {
            let health = client.health_check().await?;
            println!("Analysis service: {}", health.status);
            Ok(())
        }
    }
}

#[instrument(skip(client))]
async fn analyze(
    client: AnalysisClient,
    path: PathBuf,
    retries: usize,
    json: bool,
    details: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = SelectedFile::from_path(&path).await?;
    let file_name = file.name().to_string();

    let (mut session, mut completions) = UploadSession::new(Arc::new(client));
    session.select_file(file);

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(30))
        .with_max_times(retries)
        .with_jitter()
        .build();

    loop {
        session.submit()?;

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        pb.set_message(format!("Analyzing {file_name}..."));
        pb.enable_steady_tick(Duration::from_millis(100));

        let state = session.settle(&mut completions).await;
        pb.finish_and_clear();

        match state {
            SessionState::Succeeded { result, .. } => {
                let view = presenter::present(result);
                if json {
                    println!("{}", serde_json::to_string_pretty(&view)?);
                } else if details {
                    println!("{}", view.detailed());
                } else {
                    println!("{view}");
                }
                return Ok(());
            }
            SessionState::Failed { error, .. } if error.is_retryable() => match delays.next() {
                Some(delay) => {
                    warn!("{} Retrying in {:.1}s", error, delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                }
                None => return Err(error.clone().into()),
            },
            SessionState::Failed { error, .. } => return Err(error.clone().into()),
            other => return Err(format!("analysis ended in unexpected state '{}'", other.name()).into()),
        }
    }
}
