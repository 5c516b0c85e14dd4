use axum::{
    Extension, Router, extract::State, response::Json as ResponseJson, routing::get,
};
use db::models::note::Note;
use deployment::Deployment;
use services::services::{auth::Caller, notes::NewNoteRequest};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, routes::ApiJson};

pub async fn get_own_notes(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
) -> Result<ResponseJson<ApiResponse<Vec<Note>>>, ApiError> {
    let notes = deployment.notes().list_own(&caller).await?;
    Ok(ResponseJson(ApiResponse::success(notes)))
}

pub async fn create_note(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
    ApiJson(payload): ApiJson<NewNoteRequest>,
) -> Result<ResponseJson<ApiResponse<Note>>, ApiError> {
    let note = deployment.notes().create(&caller, payload).await?;
    Ok(ResponseJson(ApiResponse::success(note)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/notes", get(get_own_notes).post(create_note))
}
