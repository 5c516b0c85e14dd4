use std::str::FromStr;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use deployment::Deployment;
use services::services::auth::{AuthError, Caller, UserRole};
use utils::jwt::{SessionClaims, decode_session_token};

use crate::{DeploymentImpl, error::ApiError};

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_request_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
}

fn caller_from_claims(claims: &SessionClaims) -> Option<Caller> {
    let user_id = claims.user_id().ok()?;
    let role = UserRole::from_str(&claims.role).ok()?;
    Some(Caller::new(user_id, role))
}

/// Verifies the session token and makes the [`Caller`] available to handlers
/// as a request extension.
pub async fn require_session(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let caller = extract_request_token(&req)
        .ok_or("missing_token")
        .and_then(|token| {
            decode_session_token(deployment.session_secret(), token)
                .map_err(|err| {
                    tracing::debug!(error = %err, "Rejected session token");
                    "invalid_token"
                })
                .and_then(|claims| caller_from_claims(&claims).ok_or("invalid_claims"))
        });

    match caller {
        Ok(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(reason) => {
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                reason,
                "Unauthorized API request"
            );
            ApiError::from(AuthError::Unauthorized).into_response()
        }
    }
}
