use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mess_api::{
    auth::{
        email::{LogMailer, Mailer, SmtpMailer},
        otp::{InMemoryStore, KeyValueStore, OtpIssuer, RedisStore},
        AuthService, PgUserRepository, TokenService, UserRepository,
    },
    config::AppConfig,
    create_router, db,
    members::PgMemberRepository,
    orders::PgWeeklyOrderRepository,
    users::LocalFileStorage,
    AppState,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mess_api=debug,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing();

    tracing::info!("Mess API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let store: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Keeping pending OTP state in Redis");
            Arc::new(
                RedisStore::connect(url)
                    .await
                    .expect("Failed to connect to Redis"),
            )
        }
        None => {
            tracing::warn!("REDIS_URL not set, pending OTP state is kept in process memory");
            Arc::new(InMemoryStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).expect("Invalid SMTP configuration")),
        None => {
            tracing::warn!("SMTP_HOST not set, OTP emails will not be delivered");
            Arc::new(LogMailer)
        }
    };

    let tokens = TokenService::with_durations(
        config.jwt.secret.clone(),
        config.jwt.access_ttl_seconds,
        config.jwt.profile_ttl_minutes,
    );
    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db_pool.clone()));
    let otp = OtpIssuer::new(store, mailer, config.otp_ttl_seconds);
    let auth = Arc::new(AuthService::new(users.clone(), otp, tokens.clone()));

    let avatars = LocalFileStorage::new(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");

    let state = AppState {
        auth,
        tokens,
        users,
        members: Arc::new(PgMemberRepository::new(db_pool.clone())),
        orders: Arc::new(PgWeeklyOrderRepository::new(db_pool)),
        avatars: Arc::new(avatars),
    };

    // Create the application router
    let app = create_router(state);

    // Start the Axum server
    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Mess API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}
