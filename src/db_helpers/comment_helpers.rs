use sqlx::SqlitePool;

use crate::{
    errors::RequestError,
    models::{Comment, NewComment},
};

const COMMENT_SELECT: &str = r#"
        SELECT comments.id         AS "id",
               comments.body       AS "body",
               comments.author_id  AS "author_id",
               users.username      AS "author_username",
               comments.article_id AS "article_id",
               comments.created_on AS "created_on",
               comments.updated_on AS "updated_on"
        FROM   comments
               LEFT JOIN users
                      ON comments.author_id = users.id
"#;

pub async fn add_comment_to_article_in_db(
    pool: &SqlitePool,
    NewComment {
        body,
        author_id,
        article_id,
        created_on,
        updated_on,
    }: NewComment,
) -> Result<Comment, RequestError> {
    let mut tx = pool.begin().await?;

    let comment_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO comments (body, author_id, article_id, created_on, updated_on)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(body)
    .bind(author_id)
    .bind(article_id)
    .bind(created_on)
    .bind(updated_on)
    .fetch_one(&mut tx)
    .await?;

    let query = format!("{COMMENT_SELECT} WHERE comments.id = $1");
    let comment = sqlx::query_as::<_, Comment>(&query)
        .bind(comment_id)
        .fetch_one(&mut tx)
        .await?;

    tx.commit().await?;
    Ok(comment)
}

pub async fn get_comments_for_article_in_db(
    pool: &SqlitePool,
    article_id: i64,
) -> Result<Vec<Comment>, RequestError> {
    let query = format!("{COMMENT_SELECT} WHERE comments.article_id = $1 ORDER BY comments.id");
    let comments = sqlx::query_as::<_, Comment>(&query)
        .bind(article_id)
        .fetch_all(pool)
        .await?;
    Ok(comments)
}
