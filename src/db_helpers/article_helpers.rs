use sqlx::SqlitePool;

use crate::errors::RequestError;
use crate::models::{Article, NewArticle};

use super::{ArticleRow, ARTICLE_SELECT};

pub async fn list_all_articles(pool: &SqlitePool) -> Result<Vec<Article>, RequestError> {
    let query = format!("{ARTICLE_SELECT} ORDER BY articles.id");
    let articles = sqlx::query_as::<_, ArticleRow>(&query)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Article::from)
        .collect();
    Ok(articles)
}

pub async fn list_articles_by_tag_in_db(
    pool: &SqlitePool,
    tag_id: i64,
) -> Result<Vec<Article>, RequestError> {
    let query = format!(
        r#"{ARTICLE_SELECT}
            WHERE  EXISTS (SELECT 1
                           FROM   article_tags
                           WHERE  article_tags.article_id = articles.id
                                  AND article_tags.tag_id = $1)
            ORDER  BY articles.id"#
    );
    let articles = sqlx::query_as::<_, ArticleRow>(&query)
        .bind(tag_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Article::from)
        .collect();
    Ok(articles)
}

pub async fn get_article_by_slug_in_db(
    pool: &SqlitePool,
    slug: &str,
) -> Result<Option<Article>, RequestError> {
    let query = format!("{ARTICLE_SELECT} WHERE articles.slug = $1");
    let article = sqlx::query_as::<_, ArticleRow>(&query)
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(article.map(Article::from))
}

pub async fn get_article_by_id_in_db(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Article>, RequestError> {
    let query = format!("{ARTICLE_SELECT} WHERE articles.id = $1");
    let article = sqlx::query_as::<_, ArticleRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(article.map(Article::from))
}

pub async fn slug_exists_in_db(pool: &SqlitePool, slug: &str) -> Result<bool, RequestError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM articles WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Inserts the article and its tag links in one transaction.
pub async fn create_article_in_db(
    pool: &SqlitePool,
    NewArticle {
        title,
        perex,
        body,
        introduction_image,
        slug,
        author_id,
        created_at,
        updated_at,
        tags,
    }: NewArticle,
) -> Result<Article, RequestError> {
    let mut tx = pool.begin().await?;

    let article_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO articles (title, perex, body, introduction_image, slug, author_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(&title)
    .bind(&perex)
    .bind(&body)
    .bind(&introduction_image)
    .bind(&slug)
    .bind(author_id)
    .bind(created_at)
    .bind(updated_at)
    .fetch_one(&mut tx)
    .await?;

    for tag in &tags {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO article_tags (article_id, tag_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(article_id)
        .bind(tag.id)
        .execute(&mut tx)
        .await?;
    }

    tx.commit().await?;

    get_article_by_id_in_db(pool, article_id)
        .await?
        .ok_or(RequestError::ServerError)
}

/// Removes the article together with its comments and tag links. Tags
/// themselves are shared and stay.
pub async fn delete_article_in_db(pool: &SqlitePool, id: i64) -> Result<bool, RequestError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM comments WHERE article_id = $1")
        .bind(id)
        .execute(&mut tx)
        .await?;
    sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
        .bind(id)
        .execute(&mut tx)
        .await?;
    let result = sqlx::query("DELETE FROM articles WHERE id = $1")
        .bind(id)
        .execute(&mut tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}
