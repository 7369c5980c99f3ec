use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use murmur::{
    application::{
        auth::AuthService,
        comments::CommentService,
        error::AppError,
        follows::FollowService,
        forms::SignupCommand,
        groups::{CreateGroupCommand, GroupService},
        listing::ListingService,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            SessionsRepo, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};
use tokio::sync::Notify;
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::CreateUser(args) => run_create_user(settings, args).await,
        config::Command::CreateGroup(args) => run_create_group(settings, args).await,
        config::Command::DeletePost(args) => run_delete_post(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, true).await?;
    let upload_storage = init_upload_storage(&settings)?;
    let http_state = build_http_state(repositories, upload_storage, &settings);
    serve_http(&settings, http_state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings, true).await?;
    info!(target = "murmur::cli", "migrations applied");
    Ok(())
}

async fn run_create_user(
    settings: config::Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, false).await?;
    let auth = auth_service(&repositories, &settings);
    let user = auth
        .register(SignupCommand {
            username: args.username,
            password: args.password,
        })
        .await?;
    info!(target = "murmur::cli", user = %user.username, id = %user.id, "user created");
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, false).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let group = GroupService::new(groups_repo)
        .create(CreateGroupCommand {
            title: args.title,
            slug: args.slug,
            description: args.description,
        })
        .await?;
    info!(target = "murmur::cli", slug = %group.slug, id = %group.id, "group created");
    Ok(())
}

async fn run_delete_post(
    settings: config::Settings,
    args: config::DeletePostArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, false).await?;
    let upload_storage = init_upload_storage(&settings)?;
    post_service(&repositories, upload_storage)
        .delete(args.id)
        .await?;
    info!(target = "murmur::cli", post_id = %args.id, "post deleted");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
    migrate: bool,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Connect)?;

    if migrate {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(InfraError::from)?;
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn init_upload_storage(settings: &config::Settings) -> Result<Arc<UploadStorage>, AppError> {
    let root = settings.uploads.directory.clone();
    match UploadStorage::new(root.clone()) {
        Ok(storage) => Ok(Arc::new(storage)),
        Err(source) => Err(InfraError::UploadRoot { path: root, source }.into()),
    }
}

fn auth_service(repositories: &Arc<PostgresRepositories>, settings: &config::Settings) -> AuthService {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    AuthService::new(users_repo, sessions_repo, settings.session.ttl)
}

fn post_service(
    repositories: &Arc<PostgresRepositories>,
    upload_storage: Arc<UploadStorage>,
) -> PostService {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    PostService::new(posts_repo, posts_write_repo, groups_repo, upload_storage)
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    upload_storage: Arc<UploadStorage>,
    settings: &config::Settings,
) -> HttpState {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let listing = ListingService::new(
        posts_repo.clone(),
        groups_repo,
        users_repo.clone(),
        follows_repo.clone(),
        comments_repo.clone(),
    );

    HttpState {
        listing: Arc::new(listing),
        posts: Arc::new(post_service(&repositories, upload_storage.clone())),
        comments: Arc::new(CommentService::new(posts_repo, comments_repo)),
        follows: Arc::new(FollowService::new(users_repo, follows_repo)),
        auth: Arc::new(auth_service(&repositories, settings)),
        health: health_repo,
        upload_storage,
        cache: CacheState::new(CacheConfig::from(&settings.cache)),
        cookie_secure: settings.session.cookie_secure,
        upload_limit_bytes: settings.uploads.max_request_bytes.get(),
    }
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(target = "murmur::http", addr = %settings.server.addr, "listening");

    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(draining.clone()))
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(draining, settings.server.graceful_shutdown) => {
            warn!(
                target = "murmur::http",
                "graceful shutdown window elapsed, dropping open connections"
            );
        }
    }

    info!(target = "murmur::http", "server stopped");
    Ok(())
}

async fn shutdown_signal(draining: Arc<Notify>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "murmur::http", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "murmur::http", "shutdown signal received, draining connections");
    draining.notify_one();
}

/// Completes once shutdown has started and `window` has passed.
async fn drain_deadline(draining: Arc<Notify>, window: Duration) {
    draining.notified().await;
    tokio::time::sleep(window).await;
}
