use std::{fmt::Display, future::Future};

use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::{
    DBService,
    models::{employee::Employee, project::Project},
};
use deployment::Deployment;
use services::services::auth::Caller;
use uuid::Uuid;

use crate::error::ApiError;

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl<D> ModelLoaderDeps for D
where
    D: Deployment,
{
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

async fn fetch_model_or_error<M, E, Fut>(
    model_name: &'static str,
    lookup: impl Display,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Into<ApiError>,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::debug!("{model_name} {lookup} not found");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => Err(error.into()),
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    lookup: impl Display,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Into<ApiError>,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_error(model_name, lookup, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_project_middleware<S>(
    State(deployment): State<S>,
    Path(project_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Project",
        project_id,
        Project::find_by_id(&deployment.db_service().pool, project_id),
    )
    .await
}

/// Resolves the session's own employee profile for `/employees/me` routes.
/// Must run after the session middleware has inserted the [`Caller`].
pub async fn load_own_employee_middleware<S>(
    State(deployment): State<S>,
    Extension(caller): Extension<Caller>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Employee profile",
        format!("for user {}", caller.user_id),
        Employee::find_by_user_id(&deployment.db_service().pool, caller.user_id),
    )
    .await
}
