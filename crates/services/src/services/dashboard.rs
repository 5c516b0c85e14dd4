use db::{
    DBService, DbErr,
    models::{
        employee::Employee,
        project::{Project, ProjectStatus},
        task::{Task, TaskStatus},
    },
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use super::auth::{AuthError, Caller};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ManagerStats {
    pub total_projects: i64,
    pub active_projects: i64,
    pub total_employees: i64,
    /// Employees in any state other than inactive.
    pub active_employees: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct EmployeeStats {
    pub employee: Employee,
    pub current_project: Option<Project>,
    pub pending_tasks: i64,
    pub completed_tasks: i64,
}

#[derive(Clone)]
pub struct DashboardService {
    db: DBService,
}

impl DashboardService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn manager_stats(&self, caller: &Caller) -> Result<ManagerStats, DashboardError> {
        caller.require_admin("view dashboard stats")?;

        let pool = &self.db.pool;
        Ok(ManagerStats {
            total_projects: Project::count(pool).await?,
            active_projects: Project::count_by_status(pool, ProjectStatus::Active).await?,
            total_employees: Employee::count(pool).await?,
            active_employees: Employee::count_active(pool).await?,
        })
    }

    /// Stats for the caller's own profile, or `None` if they have none yet.
    /// Task counts cover the current project only.
    pub async fn employee_stats(
        &self,
        caller: &Caller,
    ) -> Result<Option<EmployeeStats>, DashboardError> {
        let pool = &self.db.pool;
        let Some(model) = Employee::find_model_by_user_id(pool, caller.user_id).await? else {
            return Ok(None);
        };

        let (current_project, pending_tasks, completed_tasks) = match model.current_project_id {
            Some(project_row_id) => {
                let project = Project::find_model_by_row_id(pool, project_row_id)
                    .await?
                    .map(Project::from_model);
                let pending =
                    Task::count_by_project_and_status(pool, project_row_id, TaskStatus::Pending)
                        .await?;
                let completed =
                    Task::count_by_project_and_status(pool, project_row_id, TaskStatus::Completed)
                        .await?;
                (project, pending, completed)
            }
            None => (None, 0, 0),
        };

        Ok(Some(EmployeeStats {
            employee: Employee::hydrate(pool, model).await?,
            current_project,
            pending_tasks,
            completed_tasks,
        }))
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        employee::{CreateEmployee, EmployeeDefaults},
        project::CreateProject,
        task::{CreateTask, UpdateTask},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use uuid::Uuid;

    use super::*;
    use crate::services::{auth::UserRole, status::StatusEngine};

    async fn setup_db() -> DBService {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&pool, None).await.unwrap();
        DBService { pool }
    }

    #[tokio::test]
    async fn manager_stats_count_projects_and_active_employees() {
        let db = setup_db().await;
        let dashboard = DashboardService::new(db.clone());
        let engine = StatusEngine::new(db.clone(), 18);
        let admin = Caller::new(1, UserRole::Admin);

        let website = Project::create(&db.pool, &CreateProject::named("Website"), 1, Uuid::new_v4())
            .await
            .unwrap();
        let mut done = CreateProject::named("Legacy");
        done.status = Some(ProjectStatus::Completed);
        Project::create(&db.pool, &done, 1, Uuid::new_v4())
            .await
            .unwrap();

        for user_id in [10, 11, 12] {
            Employee::create(
                &db.pool,
                &CreateEmployee::named(format!("User {user_id}")),
                user_id,
                EmployeeDefaults::default(),
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        }
        let busy = Employee::find_by_user_id(&db.pool, 10).await.unwrap().unwrap();
        engine
            .enter_project(&Caller::new(10, UserRole::Employee), busy.id, website.id)
            .await
            .unwrap();
        let resting = Employee::find_by_user_id(&db.pool, 11).await.unwrap().unwrap();
        engine
            .enter_rest(&Caller::new(11, UserRole::Employee), resting.id)
            .await
            .unwrap();

        let stats = dashboard.manager_stats(&admin).await.unwrap();
        assert_eq!(stats.total_projects, 2);
        assert_eq!(stats.active_projects, 1);
        assert_eq!(stats.total_employees, 3);
        assert_eq!(stats.active_employees, 2);

        let denied = dashboard
            .manager_stats(&Caller::new(10, UserRole::Employee))
            .await;
        assert!(matches!(denied, Err(DashboardError::Auth(_))));
    }

    #[tokio::test]
    async fn employee_stats_cover_current_project_tasks() {
        let db = setup_db().await;
        let dashboard = DashboardService::new(db.clone());
        let engine = StatusEngine::new(db.clone(), 18);
        let caller = Caller::new(20, UserRole::Employee);

        assert!(dashboard.employee_stats(&caller).await.unwrap().is_none());

        let employee = Employee::create(
            &db.pool,
            &CreateEmployee::named("Gil"),
            20,
            EmployeeDefaults::default(),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let idle = dashboard.employee_stats(&caller).await.unwrap().unwrap();
        assert!(idle.current_project.is_none());
        assert_eq!(idle.pending_tasks, 0);

        let project = Project::create(&db.pool, &CreateProject::named("Ops"), 1, Uuid::new_v4())
            .await
            .unwrap();
        for description in ["One", "Two", "Three"] {
            Task::create(
                &db.pool,
                &CreateTask {
                    project_id: project.id,
                    description: description.to_string(),
                    deadline: None,
                },
                1,
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        }
        let first = Task::find_by_project_id(&db.pool, project.id).await.unwrap()[0].id;
        Task::update(
            &db.pool,
            first,
            &UpdateTask {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        engine
            .enter_project(&caller, employee.id, project.id)
            .await
            .unwrap();
        let stats = dashboard.employee_stats(&caller).await.unwrap().unwrap();
        assert_eq!(stats.current_project.map(|p| p.id), Some(project.id));
        assert_eq!(stats.pending_tasks, 2);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.employee.id, employee.id);
    }
}
