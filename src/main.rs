use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;

use conecta_core::security::{env_vars, ApiKey, TokenSecret};
use conecta_llm::GeminiProvider;
use conecta_server::{diagnostics, HandlerState, ServerConfig};
use conecta_store::users::UserRepo;
use conecta_store::Database;
use conecta_telemetry::{init_telemetry, TelemetryConfig};

/// Backend for the Conecta IA civic chat assistant.
#[derive(Parser, Debug)]
#[command(name = "conecta", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 9091)]
    port: u16,

    /// SQLite database path. Defaults to ~/.conecta/database/conecta.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Gemini model to use instead of the default.
    #[arg(long)]
    model: Option<String>,

    /// Dev mode: broadcast permission-denied diagnostics to clients.
    #[arg(long)]
    dev: bool,

    /// Grant the admin role to the user with this email, then exit.
    #[arg(long, value_name = "EMAIL")]
    grant_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&TelemetryConfig::default());

    let db_path = cli.db.unwrap_or_else(default_db_path);
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    if let Some(email) = cli.grant_admin {
        return grant_admin(&db, &email);
    }

    // Required secrets. The process refuses to start without them rather
    // than failing on the first request.
    let api_key = ApiKey(SecretString::from(
        std::env::var(env_vars::GEMINI_API_KEY)
            .with_context(|| format!("{} must be set", env_vars::GEMINI_API_KEY))?,
    ));
    let jwt_secret = TokenSecret(SecretString::from(
        std::env::var(env_vars::CONECTA_JWT_SECRET)
            .with_context(|| format!("{} must be set", env_vars::CONECTA_JWT_SECRET))?,
    ));

    let google_client_id = std::env::var(env_vars::CONECTA_GOOGLE_CLIENT_ID).ok();
    let dev_mode = cli.dev || std::env::var(env_vars::CONECTA_DEV).is_ok_and(|v| v == "1");

    let provider = Arc::new(GeminiProvider::new(api_key, cli.model.as_deref()));

    let (diag_tx, _) = diagnostics::channel();
    let mut state =
        HandlerState::new(db, provider, jwt_secret, diag_tx).with_dev_mode(dev_mode);
    if let Some(client_id) = google_client_id {
        state = state.with_google(client_id);
    } else {
        tracing::info!("Google login disabled: no client ID configured");
    }

    let config = ServerConfig {
        port: cli.port,
        ..Default::default()
    };
    let handle = conecta_server::start(config, Arc::new(state))
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, dev = dev_mode, "Conecta IA ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;
    tracing::info!("Shutting down");
    Ok(())
}

/// Look up a user by email and grant the admin role.
fn grant_admin(db: &Database, email: &str) -> anyhow::Result<()> {
    let repo = UserRepo::new(db.clone());
    let user = repo
        .get_by_email(&email.trim().to_lowercase())
        .with_context(|| format!("no user with email {email}"))?;
    repo.set_admin(&user.id, true)?;
    tracing::info!(user_id = %user.id, email, "Admin role granted");
    Ok(())
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"));
    home.join(".conecta").join("database").join("conecta.db")
}
