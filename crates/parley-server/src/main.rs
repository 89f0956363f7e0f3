mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parley_api::auth::{AppState, AppStateInner};
use parley_api::routes;
use parley_mail::{HttpApiMailer, LogMailer, Mailer};

use crate::config::{Config, MailConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = parley_db::Database::open(&config.db_path)?;

    let mailer = match config.mail {
        MailConfig::HttpApi {
            endpoint,
            api_token,
            from,
        } => Mailer::HttpApi(HttpApiMailer::new(endpoint, api_token, from)),
        MailConfig::Log => {
            warn!("no mail provider configured, OTP codes will only be logged");
            Mailer::Log(LogMailer)
        }
    };

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        mailer,
        jwt_secret: config.jwt_secret,
        otp_ttl: config.otp_ttl,
    });

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
