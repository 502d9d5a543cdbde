use std::{future::IntoFuture, net::SocketAddr, path::PathBuf};

use clap::Parser;
use opa_ams::{
    Bridge, build_app, build_internal_app,
    config::BridgeConfig,
    observability::{self, metrics},
};
use tokio::sync::watch;

/// CLI arguments for the OPA/AMS bridge
#[derive(Parser, Debug)]
#[command(
    version,
    about = "OPA external-data bridge to the AMS access review API",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "opa-ams.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the bridge (default)
    Serve,
    /// Load and validate the configuration, including the mappings file, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::CheckConfig) => run_check_config(&args.config),
        Some(Command::Serve) | None => run_server(&args.config).await,
    }
}

fn load_config(path: &PathBuf) -> BridgeConfig {
    match BridgeConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn run_check_config(path: &PathBuf) {
    let config = load_config(path);
    let tenants = match config.ams.tenant_mapping() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Configuration OK: {}", path.display());
    println!("  decision route: {}", config.opa.data_path());
    match config.ams.access_review_url() {
        Ok(url) => println!("  access review:  {}", url),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
    println!("  tenants:        {}", tenants.len());
}

async fn run_server(path: &PathBuf) {
    let config = load_config(path);

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = metrics::init_metrics(&config.observability.metrics) {
        tracing::error!(error = %e, "Failed to initialize metrics");
        std::process::exit(1);
    }

    let bridge = match Bridge::from_config(&config).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start bridge");
            std::process::exit(1);
        }
    };

    let public_addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(public_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(address = %public_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    let internal_listener = if config.server.internal_enabled() {
        let addr = SocketAddr::new(config.server.host, config.server.internal_port);
        match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => Some((addr, l)),
            Err(e) => {
                tracing::error!(address = %addr, error = %e, "Failed to bind internal listener");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let jobs = bridge.spawn_jobs();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let internal_server = internal_listener.map(|(addr, listener)| {
        tracing::info!("Internal server listening on http://{}", addr);
        let app = build_internal_app(bridge.state.clone());
        tokio::spawn(
            axum::serve(listener, app)
                .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
                .into_future(),
        )
    });

    tracing::info!(
        route = %config.opa.data_path(),
        "Server listening on http://{}",
        public_addr
    );
    let app = build_app(&config, bridge.state);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
        .into_future();

    // In-flight requests get the grace period once the signal arrives
    let grace = config.server.shutdown_grace();
    let deadline = async {
        wait_for_shutdown(shutdown_rx.clone()).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
            }
        }
        _ = deadline => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Grace period elapsed, dropping remaining connections"
            );
        }
    }

    if let Some(handle) = internal_server {
        handle.abort();
    }
    for job in jobs {
        job.abort();
    }

    tracing::info!("Shutdown complete");
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // An error means the sender is gone, which only happens after it fired
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}
