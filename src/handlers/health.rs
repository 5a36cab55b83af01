use actix_web::HttpResponse;

/// GET /health_check
///
/// The server only binds after recovery and subscription, so answering at
/// all means the service is ready.
#[utoipa::path(
    get,
    path = "/health_check",
    responses((status = 200, description = "Service is up", body = String)),
    tag = "health"
)]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body(".")
}
