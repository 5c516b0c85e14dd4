use axum::{
    Extension, Router, extract::State, response::Json as ResponseJson, routing::get,
};
use deployment::Deployment;
use services::services::{
    auth::Caller,
    dashboard::{EmployeeStats, ManagerStats},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn get_manager_stats(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
) -> Result<ResponseJson<ApiResponse<ManagerStats>>, ApiError> {
    let stats = deployment.dashboard().manager_stats(&caller).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

/// `data` is `null` until the caller has created an employee profile.
pub async fn get_employee_stats(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
) -> Result<ResponseJson<ApiResponse<Option<EmployeeStats>>>, ApiError> {
    let stats = deployment.dashboard().employee_stats(&caller).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub fn router() -> Router<DeploymentImpl> {
    let dashboard_router = Router::new()
        .route("/stats", get(get_manager_stats))
        .route("/me", get(get_employee_stats));

    Router::new().nest("/dashboard", dashboard_router)
}
