use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use patchboard_api::{AppState, AppStateInner};
use patchboard_gateway::rooms::Rooms;
use patchboard_mailer::smtp::SmtpNotifier;
use patchboard_server::{cors_layer, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "patchboard=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PATCHBOARD_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PATCHBOARD_DB_PATH").unwrap_or_else(|_| "patchboard.db".into());
    let host = std::env::var("PATCHBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PATCHBOARD_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let otp_ttl_minutes: i64 = std::env::var("PATCHBOARD_OTP_TTL_MINUTES")
        .unwrap_or_else(|_| "10".into())
        .parse()?;
    let allowed_origins = std::env::var("PATCHBOARD_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173".into());

    let smtp_host = std::env::var("PATCHBOARD_SMTP_HOST").unwrap_or_else(|_| "localhost".into());
    let smtp_port: u16 = std::env::var("PATCHBOARD_SMTP_PORT")
        .unwrap_or_else(|_| "587".into())
        .parse()?;
    let smtp_username = std::env::var("PATCHBOARD_SMTP_USERNAME").ok();
    let smtp_password = std::env::var("PATCHBOARD_SMTP_PASSWORD").ok();
    let mail_from = std::env::var("PATCHBOARD_MAIL_FROM")
        .unwrap_or_else(|_| "Patchboard <no-reply@patchboard.local>".into());

    // Init database
    let db = patchboard_db::Database::open(&PathBuf::from(&db_path))?;

    let mailer = SmtpNotifier::new(
        &smtp_host,
        smtp_port,
        smtp_username,
        smtp_password,
        mail_from,
        otp_ttl_minutes,
    )?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        rooms: Rooms::new(),
        mailer: Arc::new(mailer),
        jwt_secret,
        otp_ttl_minutes,
    });

    let app = router(state, cors_layer(&allowed_origins));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Patchboard server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
