pub mod authentication;
pub mod config;
pub mod csrf;
pub mod data_formats;
pub mod db_helpers;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod stores;
pub mod uploads;
pub mod workflow;

use std::{future::Future, net::TcpListener, sync::Arc};

use anyhow::Context;
pub use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
use handlers::*;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::AppConfig;
use crate::csrf::{CsrfTokens, HmacCsrfTokens};
use crate::stores::SqliteStores;
use crate::uploads::ImageUploader;
use crate::workflow::ArticleWorkflow;

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// URL-safe, lowercase, hyphenated form of a title.
pub fn slugify(title: &str) -> String {
    slug::slugify(title)
}

pub struct AppState {
    pub config: AppConfig,
    pub pool: SqlitePool,
    pub workflow: ArticleWorkflow,
}

impl AppState {
    pub fn new(config: AppConfig, pool: SqlitePool) -> Self {
        let csrf = Arc::new(HmacCsrfTokens::new(&config.csrf_secret));
        Self::with_csrf(config, pool, csrf)
    }

    pub fn with_csrf(config: AppConfig, pool: SqlitePool, csrf: Arc<dyn CsrfTokens>) -> Self {
        let stores = Arc::new(SqliteStores::new(pool.clone()));
        let workflow = ArticleWorkflow::new(
            stores.clone(),
            stores.clone(),
            stores,
            ImageUploader::new(config.public_dir.clone()),
            csrf,
        );
        Self {
            config,
            pool,
            workflow,
        }
    }
}

pub async fn run_app(
    config: AppConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let pool = init_db(&config.database_url).await?;
    let listener = TcpListener::bind(&config.listen_addr)
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    let state = Arc::new(AppState::new(config, pool));
    state
        .workflow
        .seed_tags(&state.config.seed_tags)
        .await
        .context("Failed to seed tags")?;
    tracing::info!("Server started on {}", listener.local_addr()?);
    serve(listener, state, shutdown).await
}

pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::Server::from_tcp(listener)?
        .serve(make_router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !db_url.contains(":memory:") && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!("Creating database {}", db_url);
        Sqlite::create_database(db_url)
            .await
            .with_context(|| format!("Failed to create database {db_url}"))?;
    }
    let pool = SqlitePool::connect(db_url)
        .await
        .with_context(|| format!("Failed to connect to {db_url}"))?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::debug!("Running migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    Ok(())
}

pub fn make_router(state: Arc<AppState>) -> Router {
    let image_dir = state.workflow.uploader().image_dir();
    let upload_limit = state.config.upload_limit_bytes;
    Router::new()
        .route("/check_health", get(alive))
        .route("/users/login", post(login_user))
        .route("/users", post(register_user))
        .route("/article/", get(list_articles))
        .route(
            "/article/new",
            get(new_article_form)
                .post(create_article)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/article/:key",
            get(show_article).post(post_comment).delete(delete_article),
        )
        .nest_service("/images", ServeDir::new(image_dir))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}
