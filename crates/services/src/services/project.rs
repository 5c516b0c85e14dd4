use db::{
    DBService, DbErr, TransactionTrait,
    retry::{SqliteBusy, retry_on_sqlite_busy},
    models::{
        employee::Employee,
        project::{CreateProject, Project, ProjectError, ProjectStatus, UpdateProject},
        task::{CreateTask, Task, TaskError, UpdateTask},
    },
};
use thiserror::Error;
use uuid::Uuid;

use super::auth::{AuthError, Caller};

#[derive(Debug, Error)]
pub enum ProjectServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("Project name cannot be empty")]
    EmptyName,
    #[error("{0} employee(s) are still clocked into this project")]
    EmployeesClockedIn(i64),
}

impl SqliteBusy for ProjectServiceError {
    fn is_sqlite_busy(&self) -> bool {
        match self {
            ProjectServiceError::Database(err)
            | ProjectServiceError::Project(ProjectError::Database(err))
            | ProjectServiceError::Task(TaskError::Database(err)) => err.is_sqlite_busy(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectServiceError>;

#[derive(Clone)]
pub struct ProjectService {
    db: DBService,
}

impl ProjectService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Project>> {
        Ok(Project::find_all(&self.db.pool).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Project> {
        Project::find_by_id(&self.db.pool, id)
            .await?
            .ok_or(ProjectServiceError::Project(ProjectError::ProjectNotFound))
    }

    pub async fn create(&self, caller: &Caller, data: &CreateProject) -> Result<Project> {
        caller.require_admin("create projects")?;
        if data.name.trim().is_empty() {
            return Err(ProjectServiceError::EmptyName);
        }

        let project = Project::create(&self.db.pool, data, caller.user_id, Uuid::new_v4()).await?;
        tracing::info!(project_id = %project.id, owner_id = caller.user_id, "project created");
        Ok(project)
    }

    /// Updates a project. Moving it out of `active` is refused while anyone is
    /// clocked into it.
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        payload: &UpdateProject,
    ) -> Result<Project> {
        caller.require_admin("update projects")?;
        if matches!(payload.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ProjectServiceError::EmptyName);
        }

        let updated = retry_on_sqlite_busy(move || self.try_update(id, payload)).await?;
        tracing::info!(project_id = %id, status = %updated.status, "project updated");
        Ok(updated)
    }

    /// Deletes a project and its tasks. Notes keep pointing at the removed
    /// row and are reported without a project afterwards.
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<()> {
        caller.require_admin("delete projects")?;

        let removed_tasks = retry_on_sqlite_busy(move || self.try_delete(id)).await?;
        tracing::info!(project_id = %id, removed_tasks, "project deleted");
        Ok(())
    }

    /// The project row is write-locked before employees are counted, so a
    /// concurrent `enter_project` either finishes first and is counted or
    /// sees the new status.
    async fn try_update(&self, id: Uuid, payload: &UpdateProject) -> Result<Project> {
        let tx = self.db.pool.begin().await?;
        if !Project::lock_for_write(&tx, id).await? {
            return Err(ProjectError::ProjectNotFound.into());
        }
        let existing = Project::find_model_by_id(&tx, id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        if matches!(payload.status, Some(status) if status != ProjectStatus::Active) {
            let clocked_in = Employee::count_on_project(&tx, existing.id).await?;
            if clocked_in > 0 {
                return Err(ProjectServiceError::EmployeesClockedIn(clocked_in));
            }
        }
        let updated = Project::update(&tx, id, payload).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn try_delete(&self, id: Uuid) -> Result<u64> {
        let tx = self.db.pool.begin().await?;
        if !Project::lock_for_write(&tx, id).await? {
            return Err(ProjectError::ProjectNotFound.into());
        }
        let project = Project::find_model_by_id(&tx, id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        let clocked_in = Employee::count_on_project(&tx, project.id).await?;
        if clocked_in > 0 {
            return Err(ProjectServiceError::EmployeesClockedIn(clocked_in));
        }

        let removed_tasks = Task::delete_by_project(&tx, project.id).await?;
        Project::delete(&tx, id).await?;
        tx.commit().await?;
        Ok(removed_tasks)
    }

    pub async fn tasks(&self, project_id: Uuid) -> Result<Vec<Task>> {
        Ok(Task::find_by_project_id(&self.db.pool, project_id).await?)
    }

    pub async fn create_task(&self, caller: &Caller, data: &CreateTask) -> Result<Task> {
        let task = Task::create(&self.db.pool, data, caller.user_id, Uuid::new_v4()).await?;
        tracing::debug!(task_id = %task.id, project_id = %task.project_id, "task created");
        Ok(task)
    }

    pub async fn update_task(&self, id: Uuid, payload: &UpdateTask) -> Result<Task> {
        Ok(Task::update(&self.db.pool, id, payload).await?)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<()> {
        if Task::delete(&self.db.pool, id).await? == 0 {
            return Err(TaskError::TaskNotFound.into());
        }
        Ok(())
    }
}
