//! The article publishing workflow: listing and tag search, authoring,
//! display with commenting, and CSRF-guarded deletion.

use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;

use crate::authentication::AuthUser;
use crate::csrf::{delete_token_id, CsrfTokens};
use crate::data_formats::form::{delete_form_view, search_form_view};
use crate::data_formats::{
    ArticleForm, ArticleFormView, ArticleListView, ArticleShowView, ArticleSubmission,
    CommentForm, CommentSubmission, FormErrors, SearchQuery,
};
use crate::errors::RequestError;
use crate::models::{Article, NewArticle, NewComment, Tag};
use crate::stores::{ArticleStore, CommentStore, TagStore};
use crate::uploads::ImageUploader;

pub const ARTICLE_INDEX: &str = "/article/";
pub const ARTICLE_NEW: &str = "/article/new";

/// Slugs that would be shadowed by a static route.
const RESERVED_SLUGS: &[&str] = &["new"];

const SLUG_ATTEMPTS: usize = 5;

pub fn article_path(key: impl Display) -> String {
    format!("/article/{key}")
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Article),
    /// Nothing was submitted; the empty form.
    Form(ArticleFormView),
    Invalid(ArticleFormView),
    UploadFailed(ArticleFormView),
}

#[derive(Debug)]
pub enum CommentOutcome {
    Shown(ArticleShowView),
    Posted(ArticleShowView),
    Invalid(ArticleShowView),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Rejected,
}

#[derive(Clone)]
pub struct ArticleWorkflow {
    articles: Arc<dyn ArticleStore>,
    tags: Arc<dyn TagStore>,
    comments: Arc<dyn CommentStore>,
    uploader: ImageUploader,
    csrf: Arc<dyn CsrfTokens>,
}

impl ArticleWorkflow {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        tags: Arc<dyn TagStore>,
        comments: Arc<dyn CommentStore>,
        uploader: ImageUploader,
        csrf: Arc<dyn CsrfTokens>,
    ) -> Self {
        Self {
            articles,
            tags,
            comments,
            uploader,
            csrf,
        }
    }

    pub fn uploader(&self) -> &ImageUploader {
        &self.uploader
    }

    pub async fn seed_tags(&self, names: &[String]) -> Result<(), RequestError> {
        for name in names {
            let tag = self.tags.ensure(name).await?;
            tracing::debug!(tag_id = tag.id, name = %tag.name, "tag available");
        }
        Ok(())
    }

    /// All articles, or only those of the tag named by the query. An unknown
    /// tag yields an empty list.
    pub async fn list(&self, search: &SearchQuery) -> Result<ArticleListView, RequestError> {
        let articles = match search.tag_name() {
            None => self.articles.find_all().await?,
            Some(name) => match self.tags.find_one_by_name(name).await? {
                Some(tag) => self.tags.articles(&tag).await?,
                None => Vec::new(),
            },
        };

        Ok(ArticleListView {
            articles_count: articles.len(),
            articles: articles.into_iter().map(Into::into).collect(),
            search_form: search_form_view(ARTICLE_INDEX, search.query.as_deref()),
        })
    }

    pub async fn new_form(&self, user: Option<&AuthUser>) -> Result<ArticleFormView, RequestError> {
        require_user(user)?;
        let tags = self.tags.find_all().await?;
        Ok(article_form(
            &tags,
            &ArticleSubmission::default(),
            &FormErrors::default(),
        ))
    }

    pub async fn create(
        &self,
        user: Option<&AuthUser>,
        submission: ArticleSubmission,
    ) -> Result<CreateOutcome, RequestError> {
        let user = require_user(user)?;
        let tags = self.tags.find_all().await?;

        if !submission.submitted {
            return Ok(CreateOutcome::Form(article_form(
                &tags,
                &submission,
                &FormErrors::default(),
            )));
        }

        let valid = match ArticleForm::validate(&submission) {
            Ok(valid) => valid,
            Err(errors) => {
                return Ok(CreateOutcome::Invalid(article_form(
                    &tags,
                    &submission,
                    &errors,
                )))
            }
        };

        let mut chosen: Vec<Tag> = Vec::with_capacity(valid.tag_ids.len());
        for id in &valid.tag_ids {
            match self.tags.find(*id).await? {
                Some(tag) => chosen.push(tag),
                None => tracing::debug!(tag_id = id, "skipping unknown tag"),
            }
        }

        let introduction_image = match &valid.introduction_image {
            Some(image) => match self.uploader.store(image).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::error!(error = %e, "introduction image upload failed");
                    let mut errors = FormErrors::default();
                    errors.add_global("The introduction image could not be uploaded.");
                    return Ok(CreateOutcome::UploadFailed(article_form(
                        &tags,
                        &submission,
                        &errors,
                    )));
                }
            },
            None => None,
        };

        let now = Utc::now();
        let mut new_article = NewArticle {
            title: valid.title,
            perex: valid.perex,
            body: valid.body,
            introduction_image: introduction_image.clone(),
            slug: self.unique_slug(&valid.slug).await?,
            author_id: user.id,
            created_at: now,
            updated_at: now,
            tags: chosen,
        };

        // The slug may be taken between the lookup and the insert.
        let mut attempts = 1;
        let article = loop {
            match self.articles.persist(new_article.clone()).await {
                Ok(article) => break article,
                Err(e) if e.is_unique_violation() && attempts < SLUG_ATTEMPTS => {
                    tracing::debug!(slug = %new_article.slug, "slug taken concurrently, retrying");
                    attempts += 1;
                    new_article.slug = self.unique_slug(&valid.slug).await?;
                }
                Err(e) => {
                    if let Some(path) = &introduction_image {
                        if let Err(cleanup) = self.uploader.remove(path).await {
                            tracing::warn!(error = %cleanup, %path, "could not remove orphaned image");
                        }
                    }
                    return Err(e);
                }
            }
        };

        tracing::info!(
            article_id = article.id,
            slug = %article.slug,
            author = %user.username,
            tags = article.tags.len(),
            "article created"
        );
        Ok(CreateOutcome::Created(article))
    }

    pub async fn show(&self, slug: &str) -> Result<ArticleShowView, RequestError> {
        let article = self.find_by_slug(slug).await?;
        self.show_view(article, None, &FormErrors::default()).await
    }

    /// Posts a comment and renders the page again in place.
    pub async fn comment(
        &self,
        slug: &str,
        user: Option<&AuthUser>,
        submission: CommentSubmission,
    ) -> Result<CommentOutcome, RequestError> {
        let article = self.find_by_slug(slug).await?;

        if !submission.is_submitted() {
            let view = self.show_view(article, None, &FormErrors::default()).await?;
            return Ok(CommentOutcome::Shown(view));
        }

        let body = match CommentForm::validate(submission.body.as_deref()) {
            Ok(body) => body,
            Err(errors) => {
                let view = self
                    .show_view(article, submission.body.as_deref(), &errors)
                    .await?;
                return Ok(CommentOutcome::Invalid(view));
            }
        };

        let now = Utc::now();
        let comment = self
            .comments
            .persist(NewComment {
                body,
                author_id: user.map(|user| user.id),
                article_id: article.id,
                created_on: now,
                updated_on: now,
            })
            .await?;
        tracing::info!(
            comment_id = comment.id,
            article_id = article.id,
            author = user.map(|user| user.username.as_str()).unwrap_or("anonymous"),
            "comment posted"
        );

        let view = self.show_view(article, None, &FormErrors::default()).await?;
        Ok(CommentOutcome::Posted(view))
    }

    /// Deletes the article when `token` is the CSRF token for `delete<id>`.
    /// A wrong token is not an error: nothing happens.
    pub async fn delete(&self, id: i64, token: Option<&str>) -> Result<DeleteOutcome, RequestError> {
        let article = self
            .articles
            .find(id)
            .await?
            .ok_or(RequestError::NotFound("Article not found"))?;

        let token_id = delete_token_id(article.id);
        let authorized = token
            .map(|token| self.csrf.is_valid(&token_id, token))
            .unwrap_or(false);
        if !authorized {
            tracing::warn!(article_id = article.id, "article deletion with an invalid csrf token");
            return Ok(DeleteOutcome::Rejected);
        }

        self.articles.remove(article.id).await?;
        tracing::info!(article_id = article.id, slug = %article.slug, "article deleted");
        Ok(DeleteOutcome::Deleted)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Article, RequestError> {
        self.articles
            .find_by_slug(slug)
            .await?
            .ok_or(RequestError::NotFound("Article not found"))
    }

    async fn unique_slug(&self, base: &str) -> Result<String, RequestError> {
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while RESERVED_SLUGS.contains(&candidate.as_str())
            || self.articles.slug_exists(&candidate).await?
        {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }

    async fn show_view(
        &self,
        article: Article,
        comment_body: Option<&str>,
        errors: &FormErrors,
    ) -> Result<ArticleShowView, RequestError> {
        let comments = self.comments.find_by_article(article.id).await?;
        let token = self.csrf.token(&delete_token_id(article.id));
        Ok(ArticleShowView {
            comment_form: CommentForm::view(&article_path(&article.slug), comment_body, errors),
            delete_form: delete_form_view(&article_path(article.id), token),
            comments: comments.into_iter().map(Into::into).collect(),
            article: article.into(),
        })
    }
}

fn require_user(user: Option<&AuthUser>) -> Result<&AuthUser, RequestError> {
    user.ok_or(RequestError::NotAuthorized("You are not logged in."))
}

fn article_form(tags: &[Tag], submission: &ArticleSubmission, errors: &FormErrors) -> ArticleFormView {
    ArticleFormView {
        form: ArticleForm::view(ARTICLE_NEW, tags, submission, errors),
    }
}
