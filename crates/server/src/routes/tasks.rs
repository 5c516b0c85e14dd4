use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{post, put},
};
use db::models::task::{CreateTask, Task, UpdateTask};
use deployment::Deployment;
use services::services::auth::Caller;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, routes::ApiJson};

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment.projects().create_task(&caller, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment.projects().update_task(task_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.projects().delete_task(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<DeploymentImpl> {
    let tasks_router = Router::new()
        .route("/", post(create_task))
        .route("/{task_id}", put(update_task).delete(delete_task));

    Router::new().nest("/tasks", tasks_router)
}
