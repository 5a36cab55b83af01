use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use askama::Template;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::cache::OrderCache;
use crate::domain::order::Order;
use crate::errors::{AppError, ENTER_UID, UNKNOWN_UID};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReceivingQuery {
    /// Order uid to look up.
    #[serde(default)]
    pub uuid: String,
}

/// Result of a point lookup against the cache.
#[derive(Debug)]
pub enum Lookup {
    BadRequest,
    NotFound,
    Found(Arc<Order>),
}

/// Lookup page with the result in a `<pre>` block.
#[derive(Template)]
#[template(path = "receiving.html")]
struct ReceivingPage<'a> {
    text: &'a str,
}

pub fn lookup(cache: &OrderCache, uuid: &str) -> Lookup {
    if uuid.is_empty() {
        return Lookup::BadRequest;
    }
    match cache.get(uuid) {
        Some(order) => Lookup::Found(order),
        None => Lookup::NotFound,
    }
}

/// GET /receiving
///
/// Looks an order up in the cache and renders it as indented JSON inside a
/// small HTML page. Never touches the store.
#[utoipa::path(
    get,
    path = "/receiving",
    params(ReceivingQuery),
    responses(
        (status = 200, description = "Order found", body = String, content_type = "text/html"),
        (status = 400, description = "No uid given", body = String, content_type = "text/html"),
        (status = 404, description = "Unknown uid", body = String, content_type = "text/html"),
        (status = 500, description = "Order could not be rendered"),
    ),
    tag = "orders"
)]
pub async fn get_receiving(
    cache: web::Data<OrderCache>,
    query: web::Query<ReceivingQuery>,
) -> Result<HttpResponse, AppError> {
    let (status, text) = match lookup(&cache, &query.uuid) {
        Lookup::BadRequest => (StatusCode::BAD_REQUEST, ENTER_UID.to_string()),
        Lookup::NotFound => (StatusCode::NOT_FOUND, UNKNOWN_UID.to_string()),
        Lookup::Found(order) => (
            StatusCode::OK,
            order.to_indented_json().map_err(|e| {
                log::error!("Failed to render order {}: {}", order.order_uid, e);
                AppError::Internal(e.to_string())
            })?,
        ),
    };

    let page = ReceivingPage { text: &text }.render().map_err(|e| {
        log::error!("Template render error: {}", e);
        AppError::Internal(e.to_string())
    })?;
    Ok(HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(page))
}

/// GET /receiving/json
///
/// Same lookup as `/receiving`, answered with the order as JSON.
#[utoipa::path(
    get,
    path = "/receiving/json",
    params(ReceivingQuery),
    responses(
        (status = 200, description = "Order found", body = Order),
        (status = 400, description = "No uid given"),
        (status = 404, description = "Unknown uid"),
    ),
    tag = "orders"
)]
pub async fn get_receiving_json(
    cache: web::Data<OrderCache>,
    query: web::Query<ReceivingQuery>,
) -> Result<HttpResponse, AppError> {
    match lookup(&cache, &query.uuid) {
        Lookup::BadRequest => Err(AppError::MissingUid),
        Lookup::NotFound => Err(AppError::NotFound),
        Lookup::Found(order) => Ok(HttpResponse::Ok().json(order.as_ref())),
    }
}
