use axum::{
    Extension, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::employee::{CreateEmployee, Employee, EmployeeDefaults, UpdateEmployeeSettings};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{auth::Caller, photo::decode_photo_data};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl, error::ApiError, middleware::load_own_employee_middleware, routes::ApiJson,
};

/// Profile creation body. `photo` is an optional `data:` URL that is stored
/// in the blob store after the profile is written.
#[derive(Debug, Deserialize, TS)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub photo: Option<String>,
    pub specialties: Option<String>,
    pub qualities: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UploadPhotoRequest {
    pub photo: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct EnterProjectRequest {
    pub project_id: Uuid,
}

#[derive(Debug, Deserialize, TS)]
pub struct ExitProjectRequest {
    pub task_description: Option<String>,
}

pub async fn create_employee(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<CreateEmployeeRequest>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }

    // Decode before writing anything so bad data leaves no profile behind.
    let photo = payload
        .photo
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(decode_photo_data)
        .transpose()?;

    let defaults = {
        let config = deployment.config().read().await;
        EmployeeDefaults {
            work_minutes: config.focus.work_minutes,
            rest_minutes: config.focus.rest_minutes,
        }
    };

    let data = CreateEmployee {
        name: name.to_string(),
        photo: None,
        specialties: payload.specialties,
        qualities: payload.qualities,
    };
    let employee = Employee::create(
        &deployment.db().pool,
        &data,
        caller.user_id,
        defaults,
        Uuid::new_v4(),
    )
    .await?;
    tracing::info!(employee_id = %employee.id, user_id = caller.user_id, "employee profile created");

    // The blob is only written once the profile row exists.
    let employee = match photo {
        Some(bytes) => deployment.photos().attach_photo(&employee, bytes).await?,
        None => employee,
    };

    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn get_employees(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
) -> Result<ResponseJson<ApiResponse<Vec<Employee>>>, ApiError> {
    caller.require_admin("list employees")?;
    let employees = Employee::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(employees)))
}

pub async fn get_employee(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    Path(employee_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    caller.require_admin("view other employees")?;
    let employee = Employee::find_by_id(&deployment.db().pool, employee_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Employee not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn get_own_employee(
    Extension(employee): Extension<Employee>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn update_settings(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    Extension(employee): Extension<Employee>,
    ApiJson(payload): ApiJson<UpdateEmployeeSettings>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let employee = deployment
        .status()
        .update_settings(&caller, employee.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn upload_photo(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<UploadPhotoRequest>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let employee = deployment
        .photos()
        .upload_employee_photo(&caller, &payload.photo)
        .await?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn enter_project(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    Extension(employee): Extension<Employee>,
    ApiJson(payload): ApiJson<EnterProjectRequest>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let employee = deployment
        .status()
        .enter_project(&caller, employee.id, payload.project_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn exit_project(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    Extension(employee): Extension<Employee>,
    ApiJson(payload): ApiJson<ExitProjectRequest>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let employee = deployment
        .status()
        .exit_project(&caller, employee.id, payload.task_description)
        .await?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn enter_rest(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    Extension(employee): Extension<Employee>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let employee = deployment.status().enter_rest(&caller, employee.id).await?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn enter_meeting(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    Extension(employee): Extension<Employee>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let employee = deployment
        .status()
        .enter_meeting(&caller, employee.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub async fn go_inactive(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    Extension(employee): Extension<Employee>,
) -> Result<ResponseJson<ApiResponse<Employee>>, ApiError> {
    let employee = deployment.status().go_inactive(&caller, employee.id).await?;
    Ok(ResponseJson(ApiResponse::success(employee)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let own_router = Router::new()
        .route("/", get(get_own_employee))
        .route("/settings", put(update_settings))
        .route("/photo", post(upload_photo))
        .route("/enter-project", post(enter_project))
        .route("/exit-project", post(exit_project))
        .route("/rest", post(enter_rest))
        .route("/meeting", post(enter_meeting))
        .route("/inactive", post(go_inactive))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_own_employee_middleware::<DeploymentImpl>,
        ));

    let employees_router = Router::new()
        .route("/", get(get_employees).post(create_employee))
        .route("/{id}", get(get_employee))
        .nest("/me", own_router);

    Router::new().nest("/employees", employees_router)
}
