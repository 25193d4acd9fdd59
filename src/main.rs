use std::{process, sync::Arc, time::Duration};

use postboard::{
    application::{
        accounts::AccountService,
        error::AppError,
        listing::{ListingLimits, ListingService},
        posts::PostService,
        repos::{HealthRepo, PostsRepo, PostsWriteRepo, SessionsRepo, UsersRepo},
        session::SessionService,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, AuthState, HttpState, RouterState, SessionCookie},
        telemetry,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let router_state = build_router_state(repositories, &settings)?;

    let purge_handle = spawn_session_purge(
        router_state.auth.sessions.clone(),
        settings.session.purge_interval,
    );

    let result = serve_http(&settings, router_state).await;
    purge_handle.abort();
    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::migration(err.to_string()))?;
    info!(target = "postboard::migrate", "migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = connect_pool(settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_router_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<RouterState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let session_ttl = time::Duration::try_from(settings.session.ttl)
        .map_err(|err| AppError::unexpected(format!("session ttl out of range: {err}")))?;

    let listing = Arc::new(ListingService::new(
        posts_repo.clone(),
        ListingLimits::from(&settings.listing),
    ));
    let posts = Arc::new(PostService::new(posts_repo, posts_write_repo));
    let accounts = Arc::new(AccountService::new(users_repo.clone()));
    let sessions = Arc::new(SessionService::new(users_repo, sessions_repo, session_ttl));
    let cookie = SessionCookie::from_settings(&settings.session);

    Ok(RouterState {
        http: HttpState {
            listing: listing.clone(),
            posts: posts.clone(),
            accounts: accounts.clone(),
            sessions: sessions.clone(),
            cookie: cookie.clone(),
            health: health_repo,
        },
        api: ApiState {
            listing,
            posts,
            accounts,
            sessions: sessions.clone(),
            cookie: cookie.clone(),
        },
        auth: AuthState { sessions, cookie },
    })
}

fn spawn_session_purge(
    sessions: Arc<SessionService>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            if let Err(err) = sessions.purge_expired().await {
                warn!(
                    target = "postboard::session",
                    error = %err,
                    "failed to purge expired sessions"
                );
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, router_state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(router_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "postboard::server",
        addr = %settings.server.addr,
        "listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = shutdown_rx.changed().await;
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        _ = shutdown_signal() => {
            info!(target = "postboard::server", "shutdown requested, draining connections");
            let _ = shutdown_tx.send(true);
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "postboard::server",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "postboard::server",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
