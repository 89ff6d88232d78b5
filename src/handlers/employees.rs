use super::common::{
    created_response, ensure_shop_access, no_content_response, success_response, validate_input,
    ListQuery,
};
use crate::{
    auth::AuthUser,
    errors::{ApiError, ServiceError},
    handlers::AppState,
    services::employees::{CreateEmployeeRequest, EmployeeFilter, UpdateEmployeeRequest},
};
use axum::{
    extract::{Json, Multipart, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeListParams {
    pub shop_id: Option<Uuid>,
    /// Include deactivated employees
    #[serde(default)]
    pub include_inactive: bool,
}

/// Employees only see colleagues of their own shop.
pub async fn list_employees(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
    Query(params): Query<EmployeeListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let filter = EmployeeFilter {
        shop_id: user.shop_id.or(params.shop_id),
        include_inactive: params.include_inactive,
    };
    let employees = state.services.employees.list(&page, &filter).await?;
    Ok(success_response(employees))
}

pub async fn get_employee(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let employee = state.services.employees.get(id).await?;
    ensure_shop_access(&user, employee.shop_id)?;
    Ok(success_response(employee))
}

pub async fn create_employee(
    State(state): State<AppState>,
    Json(payload): Json<CreateEmployeeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let employee = state.services.employees.create(payload).await?;
    info!("Employee created: {}", employee.id);
    Ok(created_response(employee))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let employee = state.services.employees.update(id, payload).await?;
    Ok(success_response(employee))
}

/// Deactivates the employee
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.employees.delete(id).await?;
    Ok(no_content_response())
}

/// Upload an employee avatar from the multipart field `file`
pub async fn upload_avatar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart request: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("No filename provided in file field".into()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| {
        ApiError::ServiceError(ServiceError::ValidationError(
            "No 'file' field found. Field name must be 'file'".to_string(),
        ))
    })?;

    let employee = state
        .services
        .employees
        .upload_avatar(id, &filename, &data)
        .await?;
    Ok(success_response(employee))
}
