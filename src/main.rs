//! Arena Runner - autonomous LLM trading session driver
//!
//! 1. Attaches to (or creates) a gym trading session
//! 2. Polls market and account state on a mode-dependent cadence
//! 3. Asks the decision oracle for a trading decision
//! 4. Validates, clamps and dispatches the decision
//! 5. Optionally mirrors BUY/SELL decisions as on-chain transfers

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use arena_runner::{
    ArenaRunner, ChainClient, GymClient, OracleClient, RunnerConfig, SessionManager, SessionStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RunnerConfig::from_env();
    info!(gym = %config.gym_url, mode = %config.spec.mode, symbol = %config.spec.symbol, "starting arena runner");

    let gym = Arc::new(GymClient::new(&config.gym_url)?);
    let oracle = Arc::new(OracleClient::new(&config.oracle_url)?);
    let signer = Arc::new(ChainClient::new(&config.chain_url)?);
    let store = Arc::new(SessionStore::new(config.llm.clone(), config.chain.clone()));

    let manager = SessionManager::new(Arc::clone(&gym), Arc::clone(&store), config.retention);
    let session = manager
        .attach_or_create(config.session_id.as_deref(), &config.spec)
        .await?;
    info!(session_id = %session.id, mode = %session.mode, "session ready");

    let runner = ArenaRunner::new(gym, oracle, signer, Arc::clone(&store), config);
    let stop = runner.stop_token();

    tokio::select! {
        _ = runner.run() => {}
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            stop.stop();
        }
    }

    info!("arena runner exited");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
