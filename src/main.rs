use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use chronicle::{
    application::{
        articles::ArticleService,
        auth::{PasswordHasher, TokenService},
        error::AppError,
        media::MediaStore,
        repos::{ArticlesRepo, ArticlesWriteRepo, TagsRepo, UsersRepo},
        users::UserService,
    },
    cache::{Clock, RecentArticlesCache, SystemClock},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        media::{CloudinaryConfig, CloudinaryMediaStore},
        telemetry,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const SOURCE: &str = "chronicle::main";

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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(target = SOURCE, "database migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let app = build_application_context(repositories, clock, &settings)?;

    if let Some((name, password)) = settings.admin.credentials() {
        match app.users.ensure_admin(name, password).await {
            Ok(true) => info!(target = SOURCE, user_name = name, "admin account created"),
            Ok(false) => info!(target = SOURCE, user_name = name, "admin account present"),
            Err(err) => warn!(
                target = SOURCE,
                user_name = name,
                error = %err,
                "failed to provision admin account"
            ),
        }
    } else {
        info!(
            target = SOURCE,
            "admin.name or admin.password not configured; skipping admin provisioning"
        );
    }

    // Build the first snapshot in the background so the first reader is not kept waiting.
    app.recent.spawn_refresh();

    let router = http::build_router(app.router_state);
    serve_http(&settings.server, router).await
}

struct ApplicationContext {
    router_state: RouterState,
    users: Arc<UserService>,
    recent: Arc<RecentArticlesCache>,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_media_store(
    media: &config::MediaSettings,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn MediaStore>, AppError> {
    let missing =
        |key: &str| AppError::from(InfraError::configuration(format!("{key} is not configured")));

    let config = CloudinaryConfig {
        cloud_name: media.cloud_name.clone().ok_or_else(|| missing("media.cloud_name"))?,
        api_key: media.api_key.clone().ok_or_else(|| missing("media.api_key"))?,
        api_secret: media
            .api_secret
            .clone()
            .ok_or_else(|| missing("media.api_secret"))?,
        folder: media.folder.clone(),
        api_base: media.api_base.clone(),
        delivery_base: media.delivery_base.clone(),
        timeout: media.timeout,
    };

    let store = CloudinaryMediaStore::new(config, clock).map_err(AppError::from)?;
    Ok(Arc::new(store))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    clock: Arc<dyn Clock>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let articles_repo: Arc<dyn ArticlesRepo> = repositories.clone();
    let articles_write_repo: Arc<dyn ArticlesWriteRepo> = repositories.clone();
    let tags_repo: Arc<dyn TagsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories;

    let token_secret = settings
        .auth
        .token_secret
        .as_deref()
        .ok_or_else(|| InfraError::configuration("auth.token_secret is not configured"))
        .map_err(AppError::from)?;

    let media = build_media_store(&settings.media, clock.clone())?;

    let recent = Arc::new(RecentArticlesCache::new(
        articles_repo.clone(),
        tags_repo.clone(),
        clock.clone(),
        settings.cache.recent_window,
    ));

    let articles = Arc::new(ArticleService::new(
        articles_repo.clone(),
        articles_write_repo,
        tags_repo,
        media,
        recent.clone(),
    ));

    let users = Arc::new(UserService::new(
        users_repo,
        TokenService::new(token_secret, settings.auth.token_ttl, clock),
        PasswordHasher::new(settings.auth.salt_rounds),
    ));

    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;

    let router_state = RouterState {
        http: HttpState {
            db: articles_repo,
            max_request_bytes,
        },
        api: ApiState {
            articles,
            users: users.clone(),
        },
    };

    Ok(ApplicationContext {
        router_state,
        users,
        recent,
    })
}

async fn serve_http(
    server: &config::ServerSettings,
    router: axum::Router,
) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = SOURCE, addr = %server.addr, "listening");

    let (signalled_tx, mut signalled_rx) = watch::channel(false);
    let serve = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(true);
        })
        .into_future();

    let grace: Duration = server.graceful_shutdown;
    let drain_deadline = async move {
        if signalled_rx.wait_for(|signalled| *signalled).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = serve => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = SOURCE, "server stopped");
        }
        () = drain_deadline => {
            warn!(
                target = SOURCE,
                grace_seconds = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = SOURCE, error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = SOURCE, error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!(target = SOURCE, "received ctrl-c, shutting down"),
        () = terminate => info!(target = SOURCE, "received terminate signal, shutting down"),
    }
}
