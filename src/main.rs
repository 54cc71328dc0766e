use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::{info, warn};

use usergate::router::init_router;
use usergate::state::AppState;
use usergate_auth::{Role, TokenCodec, TokenSubject};
use usergate_config::{CorsConfig, JwtConfig, RateLimitConfig, ServerConfig, UploadConfig};
use usergate_observability::{init_metrics, init_tracing};

#[derive(Parser)]
#[command(name = "usergate")]
#[command(about = "Request gatekeeper for the user-management API", long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory uploads are stored under
    #[arg(long, env = "UPLOAD_ROOT")]
    upload_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an access token with the configured secret and print it
    IssueToken {
        /// Subject (user id)
        #[arg(short, long)]
        sub: String,

        #[arg(short, long)]
        email: String,

        /// admin or user
        #[arg(short, long, default_value = "user")]
        role: Role,

        /// Lifetime in seconds, defaults to JWT_ACCESS_EXPIRY
        #[arg(long)]
        ttl: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let jwt_config = JwtConfig::from_env();

    if let Some(Commands::IssueToken {
        sub,
        email,
        role,
        ttl,
    }) = cli.command
    {
        let codec = TokenCodec::from_config(&jwt_config);
        let ttl = ttl.map(Duration::from_secs).unwrap_or(codec.ttl());
        let token = codec
            .sign_with_ttl(&TokenSubject::new(sub, email, role), ttl)
            .map_err(|e| anyhow::anyhow!(e.message()))?;
        println!("{token}");
        return Ok(());
    }

    init_tracing();

    if jwt_config.uses_default_secret() {
        warn!("JWT_SECRET is not set, signing with the default secret");
    }

    let mut server_config = ServerConfig::from_env();
    if let Some(host) = cli.host {
        server_config.host = host;
    }
    if let Some(port) = cli.port {
        server_config.port = port;
    }

    let mut upload_config = UploadConfig::from_env();
    if let Some(root) = cli.upload_root {
        upload_config.root = root;
    }

    let metrics = init_metrics();
    let state = AppState::new(
        &jwt_config,
        RateLimitConfig::from_env(),
        upload_config,
        CorsConfig::from_env(),
        server_config.clone(),
    );
    let limiters = state.limiters.clone();

    let app = init_router(state, metrics).context("invalid route configuration")?;

    let address = server_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "Server running");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    limiters.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
