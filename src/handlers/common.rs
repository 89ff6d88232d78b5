use crate::{
    auth::AuthUser,
    config::AppConfig,
    errors::{ApiError, ServiceError},
    services::PageRequest,
    ApiResponse,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ServiceError(ServiceError::from(e)))
}

/// Employees act on behalf of their own shop only; owners see every shop.
pub fn ensure_shop_access(user: &AuthUser, shop_id: Uuid) -> Result<(), ApiError> {
    match user.shop_id {
        Some(own) if own != shop_id => Err(ApiError::ServiceError(ServiceError::Forbidden(
            format!("Not allowed to act on shop {}", shop_id),
        ))),
        _ => Ok(()),
    }
}

/// Pagination and search parameters shared by every list endpoint
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page, capped by configuration
    pub per_page: Option<u64>,
    /// Substring matched against names, codes or document numbers
    pub search: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self, config: &AppConfig) -> PageRequest {
        let per_page = self
            .per_page
            .unwrap_or(config.api_default_page_size)
            .clamp(1, config.api_max_page_size.max(1));
        PageRequest::new(self.page.unwrap_or(1), per_page).with_search(self.search.clone())
    }
}
