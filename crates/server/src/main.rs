//! Enrollo server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
};
use enrollo_api::{AppState, WebSettings, files_router, router as api_router};
use enrollo_common::{AppError, Config, LocalStorage};
use enrollo_core::{
    ActivityService, ApprovalService, AuthService, EasySlipVerifier, FileService,
    GoogleIdentityProvider, LedgerService, RegistrantEmailService, RegistrationService,
    RqrrDecoder, StudentInformationService, TopupService, sender_from_config,
};
use enrollo_db::repositories::{
    ActivityFileRepository, ActivityRepository, ActivityScheduleRepository,
    EmailTemplateRepository, FileRepository, OAuthAccountRepository, RegistrationRepository,
    SessionRepository, StudentInformationRepository, TopupTransactionRepository,
    TransactionRepository, UserRepository,
};
use sea_orm::DatabaseConnection;
use tokio::signal;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body (slip images, thumbnails, attachments).
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// How often expired sessions are purged.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "enrollo=debug,tower_http=debug".into());
    let json = std::env::var("ENROLLO_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build every service from the configuration and a database connection.
fn build_state(config: &Config, db: Arc<DatabaseConnection>) -> Result<AppState, AppError> {
    let user_repo = UserRepository::new(Arc::clone(&db));
    let activity_repo = ActivityRepository::new(Arc::clone(&db));
    let schedule_repo = ActivityScheduleRepository::new(Arc::clone(&db));
    let registration_repo = RegistrationRepository::new(Arc::clone(&db));
    let student_repo = StudentInformationRepository::new(Arc::clone(&db));

    // Collaborators are constructed once and shared by handle
    let storage = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
        config.storage.signing_secret.clone(),
    ));
    let identity_provider = Arc::new(GoogleIdentityProvider::new(&config.oauth)?);
    let slip_verifier = Arc::new(EasySlipVerifier::new(&config.slip)?);
    let qr_decoder = Arc::new(RqrrDecoder::new());
    let email_sender = config.email.as_ref().map(sender_from_config).transpose()?;
    let timezone: chrono_tz::Tz = match &config.email {
        Some(email) => email
            .timezone
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid timezone {}: {e}", email.timezone)))?,
        None => chrono_tz::Asia::Bangkok,
    };

    let file_service = FileService::new(
        FileRepository::new(Arc::clone(&db)),
        storage,
        config.storage.bucket.clone(),
        config.storage.signed_url_ttl_secs,
    );
    let ledger_service =
        LedgerService::new(Arc::clone(&db), TransactionRepository::new(Arc::clone(&db)));

    Ok(AppState {
        auth_service: AuthService::new(
            identity_provider,
            user_repo.clone(),
            OAuthAccountRepository::new(Arc::clone(&db)),
            SessionRepository::new(Arc::clone(&db)),
            config.session.ttl_secs,
        ),
        student_information_service: StudentInformationService::new(student_repo.clone()),
        activity_service: ActivityService::new(
            Arc::clone(&db),
            activity_repo.clone(),
            schedule_repo.clone(),
            ActivityFileRepository::new(Arc::clone(&db)),
            registration_repo.clone(),
            file_service.clone(),
        ),
        registration_service: RegistrationService::new(Arc::clone(&db), file_service.clone()),
        approval_service: ApprovalService::new(
            Arc::clone(&db),
            registration_repo.clone(),
            activity_repo.clone(),
            schedule_repo.clone(),
            student_repo.clone(),
            user_repo.clone(),
            file_service.clone(),
        ),
        ledger_service: ledger_service.clone(),
        topup_service: TopupService::new(
            Arc::clone(&db),
            qr_decoder,
            slip_verifier,
            file_service.clone(),
            ledger_service,
            TopupTransactionRepository::new(Arc::clone(&db)),
            config.payment.account_number.clone(),
        ),
        file_service,
        registrant_email_service: RegistrantEmailService::new(
            EmailTemplateRepository::new(Arc::clone(&db)),
            activity_repo,
            schedule_repo,
            registration_repo,
            student_repo,
            user_repo,
            email_sender,
            timezone,
        ),
        settings: WebSettings {
            frontend_url: config.server.frontend_url.clone(),
            cookie_secure: config.session.cookie_secure,
        },
    })
}

/// Periodically delete expired sessions.
fn spawn_session_purge(auth_service: AuthService) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match auth_service.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired sessions"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting enrollo server...");

    // Load configuration
    let config = Config::load()?;
    config.log_summary();

    // Connect to database
    let db = enrollo_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    enrollo_db::migrate(&db).await?;
    info!("Migrations completed");

    let state = build_state(&config, Arc::new(db))?;
    let frontend_origin: HeaderValue = config
        .server
        .frontend_url
        .trim_end_matches('/')
        .parse()?;
    spawn_session_purge(state.auth_service.clone());

    let app = Router::new()
        .nest("/api", api_router())
        .nest("/files", files_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enrollo_api::auth_middleware,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            // Session cookies need credentialed requests from the frontend origin
            CorsLayer::new()
                .allow_origin(frontend_origin)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
