use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use llm_relay::{
    agent::{LoggedAgent, ScriptedAgent},
    api::{self, ServerState},
    config::{load_config, RelayConfig},
    Pipeline,
};
use tokio::net::TcpListener;

#[derive(Parser)]
#[clap(
    name = "llm-relay",
    about = "Streams agent replies to browsers while recording conversation history"
)]
struct CliArgs {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let loaded = load_config(args.config)?;
    let mut config = loaded.config;
    init_logging(&config);
    if !loaded.config_exists {
        log::info!("no config at {}, using defaults", loaded.path.display());
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let store = config.store.build()?;
    let agent = LoggedAgent::new(
        Box::new(ScriptedAgent::echo().delay(Duration::from_millis(40))),
        "echo",
    );
    let pipeline = Pipeline::new(Arc::new(agent), store).emitter_config(config.emitter.clone());
    let state = ServerState::new(pipeline);

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("shutting down, cancelling in-flight requests");
        }
        shutdown.cancel();
    });

    let listener = TcpListener::bind(config.server.addr()).await?;
    api::serve(listener, state).await?;
    Ok(())
}

fn init_logging(config: &RelayConfig) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
}
