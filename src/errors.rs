use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::JsonResponse;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    NotAuthorized(&'static str),
    #[error("{0}")]
    RunTimeError(&'static str),
    #[error("{0}")]
    PayloadTooLarge(&'static str),
    #[error("internal server error")]
    ServerError,
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct RequestErrorJsonWrapper {
    pub errors: RequestErrorJson,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct RequestErrorJson {
    pub body: Vec<String>,
}

impl RequestErrorJsonWrapper {
    pub fn new(error: &str) -> RequestErrorJsonWrapper {
        RequestErrorJsonWrapper {
            errors: RequestErrorJson {
                body: vec![error.to_string()],
            },
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            RequestError::RunTimeError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RequestError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::ServerError | RequestError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_json_response(&self) -> JsonResponse<RequestErrorJsonWrapper> {
        let json = match self {
            RequestError::NotFound(message)
            | RequestError::NotAuthorized(message)
            | RequestError::RunTimeError(message)
            | RequestError::PayloadTooLarge(message) => RequestErrorJsonWrapper::new(message),
            RequestError::ServerError => RequestErrorJsonWrapper::new("Internal Server Error"),
            RequestError::DatabaseError(e) => {
                tracing::error!(error = %e, "database error");
                RequestErrorJsonWrapper::new("Internal Server Error")
            }
        };
        (self.status_code(), Json(json))
    }

    /// True when sqlite rejected a write because of a UNIQUE index.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RequestError::DatabaseError(sqlx::Error::Database(e)) => {
                e.message().contains("UNIQUE constraint failed")
            }
            _ => false,
        }
    }
}
