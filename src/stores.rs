//! Persistence seams used by the article workflow.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db_helpers;
use crate::errors::RequestError;
use crate::models::{Article, Comment, NewArticle, NewComment, Tag};

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Tag>, RequestError>;
    async fn find(&self, id: i64) -> Result<Option<Tag>, RequestError>;
    async fn find_one_by_name(&self, name: &str) -> Result<Option<Tag>, RequestError>;
    /// Articles linked to the tag, in insertion order.
    async fn articles(&self, tag: &Tag) -> Result<Vec<Article>, RequestError>;
    async fn ensure(&self, name: &str) -> Result<Tag, RequestError>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Article>, RequestError>;
    async fn find(&self, id: i64) -> Result<Option<Article>, RequestError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>, RequestError>;
    async fn slug_exists(&self, slug: &str) -> Result<bool, RequestError>;
    /// Saves the article and its tag links atomically.
    async fn persist(&self, article: NewArticle) -> Result<Article, RequestError>;
    /// Removes the article, its comments and its tag links.
    async fn remove(&self, id: i64) -> Result<bool, RequestError>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn persist(&self, comment: NewComment) -> Result<Comment, RequestError>;
    async fn find_by_article(&self, article_id: i64) -> Result<Vec<Comment>, RequestError>;
}

/// All three stores backed by one sqlite pool.
#[derive(Clone)]
pub struct SqliteStores {
    pool: SqlitePool,
}

impl SqliteStores {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagStore for SqliteStores {
    async fn find_all(&self) -> Result<Vec<Tag>, RequestError> {
        db_helpers::get_tags_in_db(&self.pool).await
    }

    async fn find(&self, id: i64) -> Result<Option<Tag>, RequestError> {
        db_helpers::get_tag_by_id_in_db(&self.pool, id).await
    }

    async fn find_one_by_name(&self, name: &str) -> Result<Option<Tag>, RequestError> {
        db_helpers::get_tag_by_name_in_db(&self.pool, name).await
    }

    async fn articles(&self, tag: &Tag) -> Result<Vec<Article>, RequestError> {
        db_helpers::list_articles_by_tag_in_db(&self.pool, tag.id).await
    }

    async fn ensure(&self, name: &str) -> Result<Tag, RequestError> {
        db_helpers::ensure_tag_in_db(&self.pool, name).await
    }
}

#[async_trait]
impl ArticleStore for SqliteStores {
    async fn find_all(&self) -> Result<Vec<Article>, RequestError> {
        db_helpers::list_all_articles(&self.pool).await
    }

    async fn find(&self, id: i64) -> Result<Option<Article>, RequestError> {
        db_helpers::get_article_by_id_in_db(&self.pool, id).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>, RequestError> {
        db_helpers::get_article_by_slug_in_db(&self.pool, slug).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RequestError> {
        db_helpers::slug_exists_in_db(&self.pool, slug).await
    }

    async fn persist(&self, article: NewArticle) -> Result<Article, RequestError> {
        db_helpers::create_article_in_db(&self.pool, article).await
    }

    async fn remove(&self, id: i64) -> Result<bool, RequestError> {
        db_helpers::delete_article_in_db(&self.pool, id).await
    }
}

#[async_trait]
impl CommentStore for SqliteStores {
    async fn persist(&self, comment: NewComment) -> Result<Comment, RequestError> {
        db_helpers::add_comment_to_article_in_db(&self.pool, comment).await
    }

    async fn find_by_article(&self, article_id: i64) -> Result<Vec<Comment>, RequestError> {
        db_helpers::get_comments_for_article_in_db(&self.pool, article_id).await
    }
}
