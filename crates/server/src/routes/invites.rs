use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{auth::Caller, invite::GeneratedInvite};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, routes::ApiJson};

#[derive(Debug, Serialize, TS)]
pub struct InviteValidity {
    pub valid: bool,
}

/// Redemption body. The invite routes are public, so the user id comes from
/// the identity provider's sign-up flow rather than a session.
#[derive(Debug, Deserialize, TS)]
pub struct RedeemInviteRequest {
    pub user_id: i64,
}

pub async fn generate_invite(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
) -> Result<ResponseJson<ApiResponse<GeneratedInvite>>, ApiError> {
    let invite = deployment.invites().generate(&caller).await?;
    Ok(ResponseJson(ApiResponse::success(invite)))
}

pub async fn validate_invite(
    State(deployment): State<DeploymentImpl>,
    Path(token): Path<String>,
) -> Result<ResponseJson<ApiResponse<InviteValidity>>, ApiError> {
    let valid = deployment.invites().validate(&token).await?;
    Ok(ResponseJson(ApiResponse::success(InviteValidity { valid })))
}

pub async fn redeem_invite(
    State(deployment): State<DeploymentImpl>,
    Path(token): Path<String>,
    ApiJson(payload): ApiJson<RedeemInviteRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .invites()
        .redeem(&token, payload.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Routes that require a session.
pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/invites", post(generate_invite))
}

/// Routes reachable by people who have not signed up yet.
pub fn public_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/invites/{token}", get(validate_invite))
        .route("/invites/{token}/redeem", post(redeem_invite))
}
