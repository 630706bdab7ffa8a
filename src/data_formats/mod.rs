pub mod form;
mod request;
mod response;
mod wrapper;

pub use form::{ArticleForm, ArticleSubmission, CommentForm, FormErrors, FormView};
pub use request::*;
pub use response::*;
pub use wrapper::*;
