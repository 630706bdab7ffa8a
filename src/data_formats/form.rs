//! Form schemas and the descriptors clients render them from.
//!
//! Field names follow the `form[<field>]` convention, so a browser form
//! built from a [`FormView`] posts back exactly what the binders below read.

use std::collections::BTreeMap;

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use serde::Serialize;

use crate::errors::RequestError;
use crate::models::Tag;
use crate::uploads::UploadedImage;

pub const FORM_NAME: &str = "form";
pub const TITLE_MAX_CHARS: usize = 255;

const NOT_BLANK: &str = "This value should not be blank.";
const INVALID_CHOICE: &str = "The selected choice is invalid.";
const EMPTY_FILE: &str = "An empty file is not allowed.";

pub fn field_name(field: &str) -> String {
    format!("{FORM_NAME}[{field}]")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Widget {
    Text,
    File,
    Choice,
    Hidden,
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub name: String,
    pub widget: Widget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub multiple: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl FieldView {
    fn new(name: String, widget: Widget) -> Self {
        Self {
            name,
            widget,
            label: None,
            required: false,
            multiple: false,
            value: None,
            choices: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn text(field: &str) -> Self {
        Self::new(field_name(field), Widget::Text).required()
    }

    pub fn file(field: &str) -> Self {
        Self::new(field_name(field), Widget::File)
    }

    pub fn choice(field: &str, choices: Vec<ChoiceView>) -> Self {
        let mut view = Self::new(format!("{}[]", field_name(field)), Widget::Choice);
        view.multiple = true;
        view.choices = choices;
        view
    }

    pub fn hidden(name: &str, value: impl Into<String>) -> Self {
        Self::new(name.to_string(), Widget::Hidden).value(value)
    }

    pub fn submit(field: &str, label: &str) -> Self {
        Self::new(field_name(field), Widget::Submit).label(label)
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn maybe_value(self, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.value(value),
            None => self,
        }
    }

    fn errors(mut self, errors: &FormErrors, field: &str) -> Self {
        self.errors = errors.for_field(field).to_vec();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub name: String,
    pub method: String,
    pub action: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub fields: Vec<FieldView>,
}

impl FormView {
    fn new(method: &str, action: impl Into<String>, fields: Vec<FieldView>) -> Self {
        Self {
            name: FORM_NAME.to_string(),
            method: method.to_string(),
            action: action.into(),
            errors: Vec::new(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldView> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Validation messages keyed by field; the empty key holds form-level errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_global(&mut self, message: impl Into<String>) {
        self.add("", message);
    }

    pub fn for_field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn global(&self) -> &[String] {
        self.for_field("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn not_blank(errors: &mut FormErrors, field: &str, value: Option<&str>) -> Option<String> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => {
            errors.add(field, NOT_BLANK);
            None
        }
    }
}

// ----------------- Search Form -----------------

pub fn search_form_view(action: &str, query: Option<&str>) -> FormView {
    FormView::new(
        "GET",
        action,
        vec![
            FieldView::text("query")
                .label("Search for an article by tag")
                .value(query.unwrap_or_default()),
            FieldView::submit("search", "Search"),
        ],
    )
}

// ----------------- Article Form -----------------

/// Raw `new article` submission, as bound from the multipart body.
#[derive(Debug, Clone, Default)]
pub struct ArticleSubmission {
    pub submitted: bool,
    pub title: Option<String>,
    pub perex: Option<String>,
    pub body: Option<String>,
    pub tags: Vec<String>,
    pub introduction_image: Option<UploadedImage>,
}

/// A submission that passed validation. Title, perex and body map onto the
/// article; tags and the image are bound separately.
#[derive(Debug, Clone)]
pub struct ValidArticle {
    pub title: String,
    pub perex: String,
    pub body: String,
    pub slug: String,
    pub tag_ids: Vec<i64>,
    pub introduction_image: Option<UploadedImage>,
}

pub struct ArticleForm;

impl ArticleForm {
    pub async fn bind(multipart: &mut Multipart) -> Result<ArticleSubmission, RequestError> {
        let mut submission = ArticleSubmission::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, "Malformed form submission"))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let Some(key) = name
                .strip_prefix(FORM_NAME)
                .and_then(|rest| rest.strip_prefix('['))
                .and_then(|rest| rest.split_once(']'))
                .map(|(key, _)| key.to_string())
            else {
                continue;
            };
            submission.submitted = true;

            if key == "introduction_image" {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "Could not read the uploaded file"))?
                    .to_vec();
                // Browsers send an empty part when no file was chosen.
                if !original_name.is_empty() || !bytes.is_empty() {
                    submission.introduction_image = Some(UploadedImage {
                        original_name,
                        content_type,
                        bytes,
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, "Malformed form submission"))?;
            match key.as_str() {
                "title" => submission.title = Some(value),
                "perex" => submission.perex = Some(value),
                "body" => submission.body = Some(value),
                "tags" => submission.tags.push(value),
                _ => {}
            }
        }

        Ok(submission)
    }

    pub fn validate(submission: &ArticleSubmission) -> Result<ValidArticle, FormErrors> {
        let mut errors = FormErrors::default();

        let title = not_blank(&mut errors, "title", submission.title.as_deref());
        let perex = not_blank(&mut errors, "perex", submission.perex.as_deref());
        let body = not_blank(&mut errors, "body", submission.body.as_deref());

        let mut slug = String::new();
        if let Some(title) = &title {
            if title.chars().count() > TITLE_MAX_CHARS {
                errors.add(
                    "title",
                    format!(
                        "This value is too long. It should have {TITLE_MAX_CHARS} characters or less."
                    ),
                );
            }
            slug = crate::slugify(title);
            if slug.is_empty() {
                errors.add("title", "The title must contain at least one letter or digit.");
            }
        }

        let mut tag_ids = Vec::with_capacity(submission.tags.len());
        for raw in &submission.tags {
            match raw.trim().parse::<i64>() {
                Ok(id) if !tag_ids.contains(&id) => tag_ids.push(id),
                Ok(_) => {}
                Err(_) => {
                    if errors.for_field("tags").is_empty() {
                        errors.add("tags", INVALID_CHOICE);
                    }
                }
            }
        }

        if let Some(image) = &submission.introduction_image {
            if image.bytes.is_empty() {
                errors.add("introduction_image", EMPTY_FILE);
            }
        }

        match (title, perex, body) {
            (Some(title), Some(perex), Some(body)) if errors.is_empty() => Ok(ValidArticle {
                title,
                perex,
                body,
                slug,
                tag_ids,
                introduction_image: submission.introduction_image.clone(),
            }),
            _ => Err(errors),
        }
    }

    pub fn view(
        action: &str,
        tags: &[Tag],
        submission: &ArticleSubmission,
        errors: &FormErrors,
    ) -> FormView {
        let choices = tags
            .iter()
            .map(|tag| {
                let value = tag.id.to_string();
                ChoiceView {
                    selected: submission.tags.iter().any(|chosen| chosen.trim() == value),
                    value,
                    label: tag.name.clone(),
                }
            })
            .collect();

        let mut form = FormView::new(
            "POST",
            action,
            vec![
                FieldView::text("title")
                    .label("Title")
                    .maybe_value(submission.title.as_deref())
                    .errors(errors, "title"),
                FieldView::text("perex")
                    .label("Perex")
                    .maybe_value(submission.perex.as_deref())
                    .errors(errors, "perex"),
                FieldView::file("introduction_image")
                    .label("Introduction image")
                    .errors(errors, "introduction_image"),
                FieldView::text("body")
                    .label("Body")
                    .maybe_value(submission.body.as_deref())
                    .errors(errors, "body"),
                FieldView::choice("tags", choices)
                    .label("Tags")
                    .errors(errors, "tags"),
                FieldView::submit("save", "Publish"),
            ],
        );
        form.errors = errors.global().to_vec();
        form
    }
}

/// Bodies cut off by the upload limit are reported as such, anything else
/// as a malformed submission.
fn multipart_error(e: MultipartError, message: &'static str) -> RequestError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(error = %e, "article submission over the upload limit");
        RequestError::PayloadTooLarge("The submission exceeds the upload limit")
    } else {
        tracing::debug!(error = %e, "malformed multipart body");
        RequestError::RunTimeError(message)
    }
}

// ----------------- Comment Form -----------------

pub struct CommentForm;

impl CommentForm {
    pub fn validate(body: Option<&str>) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        match not_blank(&mut errors, "body", body) {
            Some(body) => Ok(body),
            None => Err(errors),
        }
    }

    pub fn view(action: &str, body: Option<&str>, errors: &FormErrors) -> FormView {
        FormView::new(
            "POST",
            action,
            vec![
                FieldView::text("body")
                    .label("Comment")
                    .maybe_value(body)
                    .errors(errors, "body"),
                FieldView::submit("save", "Post"),
            ],
        )
    }
}

// ----------------- Delete Form -----------------

pub fn delete_form_view(action: &str, token: String) -> FormView {
    FormView::new(
        "DELETE",
        action,
        vec![
            FieldView::hidden("_token", token),
            FieldView::submit("delete", "Delete"),
        ],
    )
}
