use sqlx::SqlitePool;

use crate::{errors::RequestError, models::Tag};

pub async fn get_tags_in_db(pool: &SqlitePool) -> Result<Vec<Tag>, RequestError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(tags)
}

pub async fn get_tag_by_id_in_db(pool: &SqlitePool, id: i64) -> Result<Option<Tag>, RequestError> {
    let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(tag)
}

pub async fn get_tag_by_name_in_db(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<Tag>, RequestError> {
    let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(tag)
}

/// Inserts the tag unless one with the same name exists and returns it either way.
pub async fn ensure_tag_in_db(pool: &SqlitePool, name: &str) -> Result<Tag, RequestError> {
    let mut tx = pool.begin().await?;
    let tag = sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = excluded.name
        RETURNING id, name
        "#,
    )
    .bind(name)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(tag)
}
