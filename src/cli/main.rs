use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;

#[path = "../assessment/mod.rs"]
mod assessment;
#[path = "mod.rs"]
mod cli;
#[path = "../shared/mod.rs"]
mod shared;

use assessment::conversation::ConversationDriver;
use shared::inference::OpenAiClient;

#[derive(Parser)]
#[command(name = "excel-interviewer")]
#[command(about = "Excel Interviewer - interactive command-line Excel assessment")]
struct Args {
    /// Directory for log files
    #[arg(long, env = "EXCEL_INTERVIEWER_LOG_DIR", default_value = "logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // File only, so log lines never interleave with the prompt
    if let Err(e) = shared::logging::init_service_logging(
        &args.log_dir,
        "excel_interviewer",
        shared::logging::ConsoleOutput::Silent,
    ) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    let config = shared::config::Config::from_env()?;
    tracing::info!(
        model = %config.model,
        api_key = %config.masked_api_key(),
        "Starting Excel Interview Agent"
    );
    if !config.sample_file.exists() {
        eprintln!(
            "Warning: sample workbook '{}' not found; candidates will need it for the exercises.",
            config.sample_file.display()
        );
    }

    let client = OpenAiClient::new(&config).context("Failed to create model client")?;
    let driver = ConversationDriver::from_config(&config, Arc::new(client));

    let mut stdout = std::io::stdout();
    cli::shell::run_shell(&driver, BufReader::new(tokio::io::stdin()), &mut stdout).await
}
