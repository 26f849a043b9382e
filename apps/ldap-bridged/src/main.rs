//! `ldap-bridged` — daemon mirroring an LDAP group into a SCIM
//! user-provisioning API.
//!
//! Startup order: open and prepare the mapping store, build the service
//! provider, start the identity provider (which begins polling), serve the
//! debug endpoint, run the startup sync, then enter the event loop. Any
//! failure up to and including the sync is fatal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bridge_connector_ldap::{IdentityProvider, LdapProvider};
use bridge_reconciler::Bridge;
use bridge_scim_client::provider_from_config;
use bridge_store::MappingStore;

mod config;
mod debug;

use config::BridgeConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEBUG_ADDR: &str = "0.0.0.0:4444";

#[derive(Parser)]
#[command(
    name = "ldap-bridged",
    version,
    about = "Mirror membership of an LDAP group into a SCIM user-provisioning API"
)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args = Args::parse();
    let config = BridgeConfig::load(args.config.as_deref())?;
    config.validate()?;

    info!(
        version = VERSION,
        db_path = %config.db_path,
        group = %config.ldap.group_cn,
        dry_run = config.scim.dry_run,
        "starting ldap-bridged"
    );

    let store = MappingStore::open(&config.db_path).context("open mapping store")?;
    store.prepare().await.context("prepare mapping store")?;

    let sp = provider_from_config(&config.scim).context("build service provider")?;
    let idp = Arc::new(LdapProvider::new(config.ldap.clone()));
    let streams = idp.start().await.context("start identity provider")?;

    let listener = TcpListener::bind(DEBUG_ADDR)
        .await
        .context("bind debug endpoint")?;
    info!(addr = DEBUG_ADDR, "debug endpoint listening");
    tokio::spawn(serve_debug(listener, store.clone()));

    let directory: Arc<dyn IdentityProvider> = idp.clone();
    let bridge = Arc::new(Bridge::new(store.clone(), directory, sp));
    bridge.sync().await.context("startup sync")?;

    let event_loop = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.run(streams).await }
    });

    shutdown_signal().await;

    // Stopping the provider closes the membership streams; the event loop
    // drains what is queued and exits. The store flushes on drop.
    idp.stop().await;
    if event_loop.await.is_err() {
        error!("event loop panicked");
    }

    info!("ldap-bridged stopped");
    Ok(())
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

async fn serve_debug(listener: TcpListener, store: MappingStore) {
    if let Err(e) = axum::serve(listener, debug::router(store)).await {
        error!(error = %e, "debug server error");
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
    }
}
