use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::models::{Article, Comment};

use super::form::FormView;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Serialize, Debug)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub perex: String,
    pub body: String,
    pub introduction_image: Option<String>,
    pub author: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub body: String,
    pub author: Option<String>,
    pub created_on: String,
    pub updated_on: String,
}

impl From<Article> for ArticleResponse {
    fn from(
        Article {
            id,
            title,
            perex,
            body,
            introduction_image,
            slug,
            author_username,
            created_at,
            updated_at,
            tags,
            ..
        }: Article,
    ) -> Self {
        ArticleResponse {
            id,
            slug,
            title,
            perex,
            body,
            introduction_image,
            author: author_username,
            tags,
            created_at: timestamp(created_at),
            updated_at: timestamp(updated_at),
        }
    }
}

impl From<Comment> for CommentResponse {
    fn from(
        Comment {
            id,
            body,
            author_username,
            created_on,
            updated_on,
            ..
        }: Comment,
    ) -> Self {
        CommentResponse {
            id,
            body,
            author: author_username,
            created_on: timestamp(created_on),
            updated_on: timestamp(updated_on),
        }
    }
}

// ----------------- Views -----------------

/// `GET /article/`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListView {
    pub articles: Vec<ArticleResponse>,
    pub articles_count: usize,
    pub search_form: FormView,
}

/// `GET|POST /article/new`
#[derive(Serialize, Debug)]
pub struct ArticleFormView {
    pub form: FormView,
}

/// `GET|POST /article/{slug}`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ArticleShowView {
    pub article: ArticleResponse,
    pub comments: Vec<CommentResponse>,
    pub comment_form: FormView,
    pub delete_form: FormView,
}
