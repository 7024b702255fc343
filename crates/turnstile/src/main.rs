//! Turnstile - credential checking and identity service

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{BlacklistBackend, Config, LogFormat, parse_token_uses};
use turnstile_api::{AppState, create_router};
use turnstile_auth::{
    Authenticator, DatabaseBlacklist, IdentityRepository, InMemoryBlacklist, NewAccount,
    PasswordHasher, TokenBlacklist, TokenService,
};
use turnstile_db::{Database, Role};

/// Turnstile - Basic and Bearer authentication for HTTP services
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "TURNSTILE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "TURNSTILE_PORT")]
    port: Option<u16>,

    /// Token signing secret
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Session token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRES_IN")]
    token_expiry: Option<u64>,

    /// Token use policy; `single` rejects any token presented twice
    #[arg(long, env = "JWT_USES")]
    token_uses: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secret) = &self.secret {
            config.auth.secret = secret.clone();
        }
        if let Some(secs) = self.token_expiry {
            config.auth.token_expiry_secs = Some(secs);
        }
        if let Some(uses) = &self.token_uses {
            config.auth.token_uses = parse_token_uses(uses);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging.level, config.logging.format);

    info!("Starting Turnstile v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    // Create data directory
    if let Some(parent) = Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }

    let db_path = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;

    let hasher =
        PasswordHasher::new(&config.auth.password).context("Invalid password work factor")?;

    if config.auth.uses_default_secret() {
        warn!("Using the default token secret; set SECRET or auth.secret in production");
    }
    let tokens = Arc::new(TokenService::new(
        &config.auth.secret,
        config.auth.token_ttl(),
    ));

    let blacklist: Arc<dyn TokenBlacklist> = match config.auth.blacklist {
        BlacklistBackend::Memory => Arc::new(InMemoryBlacklist::new()),
        BlacklistBackend::Database => Arc::new(DatabaseBlacklist::new(db.clone())),
    };

    let identities = IdentityRepository::new(db, hasher)?;
    bootstrap_admin(&identities, config.auth.admin_password.as_deref()).await?;

    let authenticator = Authenticator::new(identities, tokens, blacklist, config.auth.token_uses);
    info!(
        "Token policy: {:?} use, expiry {}",
        config.auth.token_uses,
        config
            .auth
            .token_expiry_secs
            .map(|secs| format!("{}s", secs))
            .unwrap_or_else(|| "never".to_string())
    );

    let state = AppState::new(Arc::new(authenticator));
    let app = create_router(state, Some(Arc::new(metrics_handle)));

    let bind_addr = &config.server.bind_address;
    let addr: SocketAddr = format!("{}:{}", bind_addr, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", bind_addr))?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Create the `admin` identity on an empty store when a password is configured
async fn bootstrap_admin(identities: &IdentityRepository, password: Option<&str>) -> Result<()> {
    if identities.has_identities().await? {
        return Ok(());
    }

    let Some(password) = password else {
        warn!("No identities exist and auth.admin_password is not set; only signup can create one");
        return Ok(());
    };

    identities
        .signup(NewAccount {
            username: "admin".to_string(),
            password: password.to_string(),
            email: None,
            role: Role::Admin,
        })
        .await
        .context("Failed to create admin identity")?;
    info!("Created admin identity");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
