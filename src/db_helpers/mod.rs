use chrono::{DateTime, Utc};

use crate::models::Article;

mod article_helpers;
mod comment_helpers;
mod tag_helpers;
mod user_helpers;

pub use article_helpers::*;
pub use comment_helpers::*;
pub use tag_helpers::*;
pub use user_helpers::*;

// Tag names are joined with ','; names configured through SEED_TAGS can
// never contain one.
const ARTICLE_SELECT: &str = r#"
            SELECT articles.id                                     AS "id",
                   articles.title                                  AS "title",
                   articles.perex                                  AS "perex",
                   articles.body                                   AS "body",
                   articles.introduction_image                     AS "introduction_image",
                   articles.slug                                   AS "slug",
                   articles.author_id                              AS "author_id",
                   users.username                                  AS "author_username",
                   articles.created_at                             AS "created_at",
                   articles.updated_at                             AS "updated_at",
                   (SELECT Group_concat(tags.name, ',')
                    FROM   tags
                           JOIN article_tags
                             ON article_tags.tag_id = tags.id
                    WHERE  article_tags.article_id = articles.id)  AS "tag_list"
            FROM   articles
                   JOIN users
                     ON articles.author_id = users.id
"#;

#[derive(Debug, sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    perex: String,
    body: String,
    introduction_image: Option<String>,
    slug: String,
    author_id: i64,
    author_username: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    tag_list: Option<String>,
}

impl From<ArticleRow> for Article {
    fn from(
        ArticleRow {
            id,
            title,
            perex,
            body,
            introduction_image,
            slug,
            author_id,
            author_username,
            created_at,
            updated_at,
            tag_list,
        }: ArticleRow,
    ) -> Self {
        let mut tags: Vec<String> = tag_list
            .map(|list| list.split(',').map(|s| s.to_string()).collect())
            .unwrap_or_default();
        tags.sort();
        Article {
            id,
            title,
            perex,
            body,
            introduction_image,
            slug,
            author_id,
            author_username,
            created_at,
            updated_at,
            tags,
        }
    }
}
