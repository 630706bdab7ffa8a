use serde::{Deserialize, Serialize};

// ----------------- User Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

// ----------------- Article Request -----------------

/// `GET /article/?form[query]=<tag name>`
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct SearchQuery {
    #[serde(rename = "form[query]", default)]
    pub query: Option<String>,
}

impl SearchQuery {
    /// The tag to search for; an empty query means "everything".
    pub fn tag_name(&self) -> Option<&str> {
        self.query.as_deref().filter(|query| !query.is_empty())
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct CommentSubmission {
    #[serde(rename = "form[body]", default)]
    pub body: Option<String>,
}

impl CommentSubmission {
    pub fn is_submitted(&self) -> bool {
        self.body.is_some()
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct DeleteRequest {
    #[serde(rename = "_token", default)]
    pub token: Option<String>,
}
