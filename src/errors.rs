use actix_web::HttpResponse;
use thiserror::Error;

/// Shown when the lookup parameter is empty or missing.
pub const ENTER_UID: &str = "enter uid";
/// Shown when the cache has no order under the requested id.
pub const UNKNOWN_UID: &str = "there is no such uid, enter another one";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}", ENTER_UID)]
    MissingUid,

    #[error("{}", UNKNOWN_UID)]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::MissingUid => HttpResponse::BadRequest().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::Internal(_) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })),
        }
    }
}
