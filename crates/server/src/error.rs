use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        employee::EmployeeError, note::NoteError, project::ProjectError, task::TaskError,
    },
    retry::SqliteBusy,
};
use services::services::{
    auth::AuthError,
    dashboard::DashboardError,
    invite::InviteError,
    notes::NoteServiceError,
    photo::{BlobError, PhotoError},
    project::ProjectServiceError,
    status::StatusEngineError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Employee(#[from] EmployeeError),
    #[error(transparent)]
    StatusEngine(#[from] StatusEngineError),
    #[error(transparent)]
    Invite(#[from] InviteError),
    #[error(transparent)]
    ProjectService(#[from] ProjectServiceError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error(transparent)]
    Note(#[from] NoteServiceError),
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error("Invalid request body: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Stable categories every failure collapses into at the HTTP edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidRequest,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_server_error(self) -> bool {
        matches!(self, ErrorKind::Unavailable | ErrorKind::Internal)
    }
}

fn db_kind(err: &DbErr) -> ErrorKind {
    match err {
        DbErr::RecordNotFound(_) => ErrorKind::NotFound,
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => ErrorKind::Unavailable,
        err if err.is_sqlite_busy() => ErrorKind::Unavailable,
        _ => ErrorKind::Internal,
    }
}

fn auth_kind(err: &AuthError) -> ErrorKind {
    match err {
        AuthError::Unauthorized => ErrorKind::Unauthorized,
        AuthError::Forbidden(_) => ErrorKind::Forbidden,
    }
}

fn employee_kind(err: &EmployeeError) -> ErrorKind {
    match err {
        EmployeeError::Database(e) => db_kind(e),
        EmployeeError::EmployeeNotFound => ErrorKind::NotFound,
        EmployeeError::AlreadyExists => ErrorKind::Conflict,
    }
}

fn project_kind(err: &ProjectError) -> ErrorKind {
    match err {
        ProjectError::Database(e) => db_kind(e),
        ProjectError::ProjectNotFound => ErrorKind::NotFound,
    }
}

fn task_kind(err: &TaskError) -> ErrorKind {
    match err {
        TaskError::Database(e) => db_kind(e),
        TaskError::TaskNotFound | TaskError::ProjectNotFound => ErrorKind::NotFound,
        TaskError::EmptyDescription | TaskError::InvalidStatusTransition => {
            ErrorKind::InvalidRequest
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Database(e) => db_kind(e),
            ApiError::Auth(e) => auth_kind(e),
            ApiError::Employee(e) => employee_kind(e),
            ApiError::StatusEngine(e) => match e {
                StatusEngineError::Database(e) => db_kind(e),
                StatusEngineError::Auth(e) => auth_kind(e),
                StatusEngineError::Task(e) => task_kind(e),
                StatusEngineError::EmployeeNotFound | StatusEngineError::ProjectNotFound => {
                    ErrorKind::NotFound
                }
                StatusEngineError::ProjectNotActive | StatusEngineError::InvalidSettings(_) => {
                    ErrorKind::InvalidRequest
                }
                StatusEngineError::ConcurrentUpdate => ErrorKind::Conflict,
            },
            ApiError::Invite(e) => match e {
                InviteError::Database(e) => db_kind(e),
                InviteError::Auth(e) => auth_kind(e),
                InviteError::NotFound => ErrorKind::NotFound,
                InviteError::InvalidOrExpired => ErrorKind::InvalidRequest,
            },
            ApiError::ProjectService(e) => match e {
                ProjectServiceError::Database(e) => db_kind(e),
                ProjectServiceError::Auth(e) => auth_kind(e),
                ProjectServiceError::Project(e) => project_kind(e),
                ProjectServiceError::Task(e) => task_kind(e),
                ProjectServiceError::EmptyName | ProjectServiceError::EmployeesClockedIn(_) => {
                    ErrorKind::InvalidRequest
                }
            },
            ApiError::Dashboard(e) => match e {
                DashboardError::Database(e) => db_kind(e),
                DashboardError::Auth(e) => auth_kind(e),
            },
            ApiError::Note(e) => match e {
                NoteServiceError::Database(e) => db_kind(e),
                NoteServiceError::Note(NoteError::Database(e)) => db_kind(e),
                NoteServiceError::Note(NoteError::ProjectNotFound)
                | NoteServiceError::EmployeeNotFound => ErrorKind::NotFound,
                NoteServiceError::Note(NoteError::EmptyTitle) => {
                    ErrorKind::InvalidRequest
                }
            },
            ApiError::Photo(e) => match e {
                PhotoError::Database(e) => db_kind(e),
                PhotoError::Employee(e) => employee_kind(e),
                PhotoError::Blob(BlobError::InvalidKey(_)) => ErrorKind::InvalidRequest,
                PhotoError::Blob(BlobError::Io(_)) => ErrorKind::Internal,
                PhotoError::InvalidData(_) | PhotoError::TooLarge => ErrorKind::InvalidRequest,
                PhotoError::EmployeeNotFound => ErrorKind::NotFound,
            },
            ApiError::JsonRejection(_) | ApiError::BadRequest(_) => ErrorKind::InvalidRequest,
            ApiError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg.clone(),
            ApiError::JsonRejection(rejection) => rejection.body_text(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status_code = kind.status_code();

        let message = match kind {
            ErrorKind::Unavailable => "Service temporarily unavailable".to_string(),
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.client_message(),
        };

        if kind.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_kind = ?kind,
                error = %self,
                "API request failed"
            );
        } else {
            tracing::debug!(status = %status_code, error = %self, "API request rejected");
        }

        let response = ApiResponse::<()>::error(&message);
        (status_code, Json(response)).into_response()
    }
}
