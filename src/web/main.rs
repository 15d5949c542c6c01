use anyhow::Result;
use clap::Parser;
use std::time::Duration;

#[path = "../assessment/mod.rs"]
mod assessment;
#[path = "../shared/mod.rs"]
mod shared;
#[path = "mod.rs"]
mod web;

#[derive(Parser)]
#[command(name = "excel-interviewer-web")]
#[command(about = "Excel Interviewer - browser chat shell for the Excel assessment")]
struct Args {
    /// Address to bind
    #[arg(long, env = "EXCEL_INTERVIEWER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "EXCEL_INTERVIEWER_PORT", default_value_t = 8501)]
    port: u16,

    /// Minutes a browser session may sit idle before it is dropped
    #[arg(long, env = "EXCEL_INTERVIEWER_SESSION_IDLE_MINS", default_value_t = 60)]
    session_idle_mins: u64,

    /// Directory for log files
    #[arg(long, env = "EXCEL_INTERVIEWER_LOG_DIR", default_value = "logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = shared::logging::init_service_logging(
        &args.log_dir,
        "excel_interviewer_web",
        shared::logging::ConsoleOutput::Stdout,
    ) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    // Fails fast when no credential is configured.
    let config = shared::config::Config::from_env()?;

    let session_idle = Duration::from_secs(args.session_idle_mins.max(1) * 60);
    web::server::run_web_server(config, &args.host, args.port, session_idle).await
}
