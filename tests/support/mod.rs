// Shared by several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use std::{net::TcpListener, path::PathBuf, sync::Arc};

use chrono::Utc;
use newsroom::{
    authentication::{get_jwt_token, AuthUser},
    config::AppConfig,
    csrf::CsrfTokens,
    db_helpers,
    models::{Article, NewArticle, Tag, User},
    AppState,
};
use rand::Rng;
use reqwest::{redirect::Policy, Client};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Accepts exactly the token id itself as the token, so `delete5` is the
/// token for article 5.
pub struct PlainCsrfTokens;

impl CsrfTokens for PlainCsrfTokens {
    fn token(&self, token_id: &str) -> String {
        token_id.to_string()
    }

    fn is_valid(&self, token_id: &str, token: &str) -> bool {
        token_id == token
    }
}

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!(
        "newsroom-test-{:016x}",
        rand::thread_rng().gen::<u64>()
    ))
}

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    newsroom::run_migrations(&pool).await.expect("migrations");
    pool
}

pub async fn build_state(csrf: Option<Arc<dyn CsrfTokens>>) -> Arc<AppState> {
    build_state_in(scratch_dir(), csrf).await
}

pub async fn build_state_in(public_dir: PathBuf, csrf: Option<Arc<dyn CsrfTokens>>) -> Arc<AppState> {
    build_state_with(AppConfig::local("sqlite::memory:", public_dir), csrf).await
}

pub async fn build_state_with(config: AppConfig, csrf: Option<Arc<dyn CsrfTokens>>) -> Arc<AppState> {
    let pool = memory_pool().await;
    let state = match csrf {
        Some(csrf) => AppState::with_csrf(config, pool, csrf),
        None => AppState::new(config, pool),
    };
    Arc::new(state)
}

pub async fn user(state: &AppState, username: &str) -> (User, AuthUser) {
    let user = db_helpers::insert_user(
        &state.pool,
        username,
        &format!("{username}@example.com"),
        "not-a-real-hash",
    )
    .await
    .expect("insert user");
    let auth = AuthUser {
        id: user.id,
        username: user.username.clone(),
    };
    (user, auth)
}

/// A stored user and a token for the `Authorization: Token <jwt>` header.
pub async fn signed_in(state: &AppState, username: &str) -> (User, String) {
    let (user, _) = self::user(state, username).await;
    let token = get_jwt_token(&state.config.jwt_secret, user.id).expect("jwt");
    (user, token)
}

pub async fn tag(state: &AppState, name: &str) -> Tag {
    db_helpers::ensure_tag_in_db(&state.pool, name)
        .await
        .expect("tag")
}

pub async fn article(state: &AppState, author: &User, slug: &str, tags: Vec<Tag>) -> Article {
    let now = Utc::now();
    db_helpers::create_article_in_db(
        &state.pool,
        NewArticle {
            title: slug.replace('-', " "),
            perex: format!("{slug} perex"),
            body: format!("{slug} body"),
            introduction_image: None,
            slug: slug.to_string(),
            author_id: author.id,
            created_at: now,
            updated_at: now,
            tags,
        },
    )
    .await
    .expect("article")
}

pub struct TestApp {
    pub address: String,
    pub state: Arc<AppState>,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

pub async fn spawn_app(csrf: Option<Arc<dyn CsrfTokens>>) -> TestApp {
    spawn_app_with(csrf, |_| {}).await
}

pub async fn spawn_app_with(
    csrf: Option<Arc<dyn CsrfTokens>>,
    configure: impl FnOnce(&mut AppConfig),
) -> TestApp {
    let mut config = AppConfig::local("sqlite::memory:", scratch_dir());
    configure(&mut config);
    let state = build_state_with(config, csrf).await;
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let address = format!("http://{}", listener.local_addr().expect("local addr"));

    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        newsroom::serve(listener, server_state, std::future::pending())
            .await
            .expect("server");
    });

    let client = Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("client");
    TestApp {
        address,
        state,
        client,
    }
}
