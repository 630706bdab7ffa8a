use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};

use crate::{
    authentication::{get_jwt_token, hash_password_argon2, verify_password_argon2, MaybeUser},
    data_formats::{
        ArticleForm, ArticleFormView, ArticleListView, ArticleShowView, ArticleSubmission,
        CommentSubmission, DeleteRequest, LoginRequest, RegisterRequest, SearchQuery,
        UserResponse, UserWrapper,
    },
    db_helpers::{get_user_by_email, insert_user},
    errors::RequestError,
    workflow::{CommentOutcome, CreateOutcome, ARTICLE_INDEX},
    AppState,
};

type UserJson = UserWrapper<UserResponse>;

type JsonResult<T> = Result<Json<T>, RequestError>;

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> Result<(), (StatusCode, String)> {
    Err((
        StatusCode::NOT_FOUND,
        format!("URL {} provided was not found", uri),
    ))
}

// ----------------- User Handlers -----------------
pub async fn login_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(UserWrapper { user: request }): Json<UserWrapper<LoginRequest>>,
) -> JsonResult<UserJson> {
    let user = get_user_by_email(&state.pool, &request.email)
        .await?
        .ok_or(RequestError::RunTimeError("Email not found"))?;

    let is_password_correct = verify_password_argon2(request.password, user.password)
        .await
        .map_err(|_| RequestError::RunTimeError("Could not login user\nPlease Try again"))?;
    if !is_password_correct {
        return Err(RequestError::RunTimeError("Incorrect password"));
    }

    let token = get_jwt_token(&state.config.jwt_secret, user.id).map_err(|e| {
        tracing::error!(error = %e, "could not issue jwt");
        RequestError::ServerError
    })?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse {
        username: user.username,
        email: user.email,
        token,
    })))
}

pub async fn register_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(UserWrapper { user: request }): Json<UserWrapper<RegisterRequest>>,
) -> JsonResult<UserJson> {
    let password_hash = hash_password_argon2(request.password)
        .await
        .map_err(|_| RequestError::RunTimeError("Could not register user\nPlease Try again"))?;

    let user = insert_user(&state.pool, &request.username, &request.email, &password_hash)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                RequestError::RunTimeError("Username or email already exists")
            } else {
                e
            }
        })?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    let token = get_jwt_token(&state.config.jwt_secret, user.id).map_err(|e| {
        tracing::error!(error = %e, "could not issue jwt");
        RequestError::ServerError
    })?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse {
        username: user.username,
        email: user.email,
        token,
    })))
}
// ----------------- End User Handlers -----------------

// ----------------- Article Handlers -----------------

pub async fn list_articles(
    Extension(state): Extension<Arc<AppState>>,
    Query(search): Query<SearchQuery>,
) -> JsonResult<ArticleListView> {
    Ok(Json(state.workflow.list(&search).await?))
}

pub async fn new_article_form(
    Extension(state): Extension<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
) -> JsonResult<ArticleFormView> {
    Ok(Json(state.workflow.new_form(user.as_ref()).await?))
}

pub async fn create_article(
    Extension(state): Extension<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RequestError> {
    // Anonymous bodies are never read; a body that is not multipart was not
    // a submission of this form.
    let submission = match (&user, multipart) {
        (Some(_), Ok(mut multipart)) => ArticleForm::bind(&mut multipart).await?,
        _ => ArticleSubmission::default(),
    };

    let response = match state.workflow.create(user.as_ref(), submission).await? {
        CreateOutcome::Created(_) => Redirect::to(ARTICLE_INDEX).into_response(),
        CreateOutcome::Form(view) => (StatusCode::OK, Json(view)).into_response(),
        CreateOutcome::Invalid(view) => (StatusCode::UNPROCESSABLE_ENTITY, Json(view)).into_response(),
        CreateOutcome::UploadFailed(view) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(view)).into_response()
        }
    };
    Ok(response)
}

pub async fn show_article(
    Extension(state): Extension<Arc<AppState>>,
    Path(slug): Path<String>,
) -> JsonResult<ArticleShowView> {
    Ok(Json(state.workflow.show(&slug).await?))
}

pub async fn post_comment(
    Extension(state): Extension<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    form: Option<Form<CommentSubmission>>,
) -> Result<(StatusCode, Json<ArticleShowView>), RequestError> {
    let submission = form.map(|Form(submission)| submission).unwrap_or_default();
    let response = match state.workflow.comment(&slug, user.as_ref(), submission).await? {
        CommentOutcome::Shown(view) | CommentOutcome::Posted(view) => (StatusCode::OK, Json(view)),
        CommentOutcome::Invalid(view) => (StatusCode::UNPROCESSABLE_ENTITY, Json(view)),
    };
    Ok(response)
}

pub async fn delete_article(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    form: Option<Form<DeleteRequest>>,
) -> Result<Redirect, RequestError> {
    let id = id
        .parse::<i64>()
        .map_err(|_| RequestError::NotFound("Article not found"))?;
    let token = form.and_then(|Form(request)| request.token);
    state.workflow.delete(id, token.as_deref()).await?;
    Ok(Redirect::to(ARTICLE_INDEX))
}
