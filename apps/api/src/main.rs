mod auth;
mod config;
mod db;
mod errors;
mod llm_client;
mod mailer;
mod models;
mod resumes;
mod routes;
mod state;
mod storage;
mod tailoring;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::identity::{IdentityStore, MemoryIdentityStore, PgIdentityStore};
use crate::auth::otp::{MemoryOtpStore, OtpStore, RedisOtpStore};
use crate::auth::service::{AuthBackends, AuthSettings};
use crate::auth::session::{
    MemoryRevocationList, RedisRevocationList, RevocationList, SessionKeys,
};
use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::mailer::{LogMailer, Mailer, SmtpMailer};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3BlobStore;
use crate::tailoring::LlmTailor;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume API v{}", env!("CARGO_PKG_VERSION"));

    let auth = Arc::new(build_auth_service(&config).await?);

    let s3 = build_s3_client(&config).await;
    let blobs = Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.llm_model.clone())?;
    info!("LLM client initialized (model: {})", llm.model());

    spawn_sweeper(auth.clone());

    let state = AppState {
        config: config.clone(),
        auth,
        blobs,
        tailor: Arc::new(LlmTailor::new(llm)),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wires the auth core to Postgres/Redis when configured, in-memory stores otherwise.
async fn build_auth_service(config: &Config) -> Result<AuthService> {
    let identities: Arc<dyn IdentityStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgIdentityStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, identities are kept in memory");
            Arc::new(MemoryIdentityStore::new())
        }
    };

    let (otps, revocations): (Arc<dyn OtpStore>, Arc<dyn RevocationList>) =
        match &config.redis_url {
            Some(url) => {
                let client = redis::Client::open(url.as_str())?;
                let otps = RedisOtpStore::connect(&client).await?;
                let revocations = RedisRevocationList::connect(&client).await?;
                info!("Redis OTP store and session denylist initialized");
                (Arc::new(otps), Arc::new(revocations))
            }
            None => {
                warn!("REDIS_URL not set, OTP records and revocations are kept in memory");
                (
                    Arc::new(MemoryOtpStore::new()),
                    Arc::new(MemoryRevocationList::new()),
                )
            }
        };

    let otp_ttl = chrono::Duration::seconds(config.otp_ttl_secs);
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!("SMTP mailer initialized ({}:{})", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp, otp_ttl.num_minutes())?)
        }
        None => {
            warn!("SMTP_HOST not set, login codes will only be logged");
            Arc::new(LogMailer)
        }
    };

    Ok(AuthService::new(
        AuthBackends {
            otps,
            identities,
            revocations,
            mailer,
        },
        SessionKeys::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::seconds(config.session_ttl_secs),
        ),
        AuthSettings {
            otp_ttl,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            email_timeout: Duration::from_secs(config.email_timeout_secs),
        },
    ))
}

/// Drops expired OTP records and denylist entries once a minute.
fn spawn_sweeper(auth: Arc<AuthService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match auth.purge_expired(chrono::Utc::now()).await {
                Ok((0, 0)) => {}
                Ok((otps, revocations)) => {
                    info!(otps, revocations, "Purged expired auth records")
                }
                Err(e) => warn!("Auth sweep failed: {e}"),
            }
        }
    });
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resume-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not by virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
