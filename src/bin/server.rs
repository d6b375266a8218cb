use log::{error, info};
use std::sync::Arc;

use skyquery::config::AppConfig;
use skyquery::web::{create_router, AppState};
use skyquery::Pipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>>
{   skyquery::logging::init_logging();

    let config = AppConfig::from_env()?;
    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let app = create_router(AppState { pipeline: pipeline.clone() });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
      .with_graceful_shutdown(shutdown_signal())
      .await?;

    // the router is gone, so this is the last handle
    match Arc::try_unwrap(pipeline)
    {   Ok(pipeline) => pipeline.shutdown().await?
      , Err(_) => error!("Pipeline still shared at shutdown; trace flush skipped")
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal()
{   if let Err(e) = tokio::signal::ctrl_c().await
    {   error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
