use chrono::{DateTime, NaiveDateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub perex: String,
    pub body: String,
    pub introduction_image: Option<String>,
    pub slug: String,
    pub author_id: i64,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Everything needed to insert an article; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub perex: String,
    pub body: String,
    pub introduction_image: Option<String>,
    pub slug: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub author_id: Option<i64>,
    pub author_username: Option<String>,
    pub article_id: i64,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub body: String,
    pub author_id: Option<i64>,
    pub article_id: i64,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}
