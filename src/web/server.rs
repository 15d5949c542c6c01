use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::assessment::conversation::ConversationDriver;
use crate::shared::config::Config;
use crate::shared::inference::OpenAiClient;
use crate::web::{create_router, state::AppState};

pub async fn run_web_server(
    config: Config,
    host: &str,
    port: u16,
    session_idle_timeout: Duration,
) -> Result<()> {
    info!(
        r#"
 _____              _   ___       _                  _
| ____|_  _____ ___| | |_ _|_ __ | |_ ___ _ ____   _(_) _____      _____ _ __
|  _| \ \/ / __/ _ \ |  | || '_ \| __/ _ \ '__\ \ / / |/ _ \ \ /\ / / _ \ '__|
| |___ >  < (_|  __/ |  | || | | | ||  __/ |   \ V /| |  __/\ V  V /  __/ |
|_____/_/\_\___\___|_| |___|_| |_|\__\___|_|    \_/ |_|\___| \_/\_/ \___|_|

Starting Excel Interviewer web shell...
PID: {}
"#,
        std::process::id()
    );
    info!(
        model = %config.model,
        api_base = %config.api_base,
        api_key = %config.masked_api_key(),
        report_dir = %config.report_dir.display(),
        session_idle_secs = session_idle_timeout.as_secs(),
        "Loaded configuration"
    );

    let config = Arc::new(config);
    let client = OpenAiClient::new(&config).context("Failed to create model client")?;
    let driver = ConversationDriver::from_config(&config, Arc::new(client));
    let app = create_router(AppState::new(config, driver).with_idle_timeout(session_idle_timeout));

    let bind_addr = format!("{host}:{port}");
    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!("Web shell started: http://{}", bind_addr);
    info!("REST API Endpoint: http://{}/api/v0", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Web shell stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
