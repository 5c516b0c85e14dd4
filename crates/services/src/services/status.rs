//! Employee activity state machine.
//!
//! Every transition runs as one transaction: write-lock and load the employee,
//! check the caller owns it, validate, write the side effects, then update the
//! row only if its version is unchanged. A lost version race aborts the whole
//! unit.

use chrono::Utc;
use db::{
    DBService, DatabaseTransaction, DbErr, TransactionTrait,
    entities::employee as employee_entity,
    models::{
        employee::{Employee, EmployeeStatus, EmployeeTransition, UpdateEmployeeSettings},
        note::{NewNote, Note, NoteType},
        project::{Project, ProjectStatus},
        task::{Task, TaskError},
    },
    retry::{SqliteBusy, retry_on_sqlite_busy},
};
use thiserror::Error;
use uuid::Uuid;

use super::{
    auth::{AuthError, Caller},
    config::MAX_DURATION_MINUTES,
    notes::default_deadline,
};

pub const PROJECT_ENTRY_TITLE: &str = "Project entry";
pub const PROJECT_EXIT_TITLE: &str = "Project exit";

#[derive(Debug, Error)]
pub enum StatusEngineError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("Employee not found")]
    EmployeeNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Project is not active")]
    ProjectNotActive,
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Employee was modified concurrently, reload and try again")]
    ConcurrentUpdate,
}

impl SqliteBusy for StatusEngineError {
    fn is_sqlite_busy(&self) -> bool {
        match self {
            StatusEngineError::Database(err) => err.is_sqlite_busy(),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct StatusEngine {
    db: DBService,
    note_deadline_hour: u32,
}

impl StatusEngine {
    pub fn new(db: DBService, note_deadline_hour: u32) -> Self {
        Self {
            db,
            note_deadline_hour,
        }
    }

    /// Clock the employee into an active project and record a project entry
    /// note.
    pub async fn enter_project(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        project_id: Uuid,
    ) -> Result<Employee, StatusEngineError> {
        let employee = retry_on_sqlite_busy(move || {
            self.try_enter_project(caller, employee_id, project_id)
        })
        .await?;
        tracing::info!(
            employee_id = %employee_id,
            project_id = %project_id,
            "employee entered project"
        );
        Ok(employee)
    }

    /// Leave the current project (optionally logging a follow-up task) and
    /// start resting. Without a current project this is a plain rest
    /// transition.
    pub async fn exit_project(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        task_description: Option<String>,
    ) -> Result<Employee, StatusEngineError> {
        let description = task_description.as_deref();
        let employee = retry_on_sqlite_busy(move || {
            self.try_exit_project(caller, employee_id, description)
        })
        .await?;
        tracing::info!(employee_id = %employee_id, "employee left project");
        Ok(employee)
    }

    pub async fn enter_rest(
        &self,
        caller: &Caller,
        employee_id: Uuid,
    ) -> Result<Employee, StatusEngineError> {
        self.set_plain_status(caller, employee_id, EmployeeStatus::Rest)
            .await
    }

    pub async fn enter_meeting(
        &self,
        caller: &Caller,
        employee_id: Uuid,
    ) -> Result<Employee, StatusEngineError> {
        self.set_plain_status(caller, employee_id, EmployeeStatus::Meeting)
            .await
    }

    pub async fn go_inactive(
        &self,
        caller: &Caller,
        employee_id: Uuid,
    ) -> Result<Employee, StatusEngineError> {
        self.set_plain_status(caller, employee_id, EmployeeStatus::Inactive)
            .await
    }

    pub async fn update_settings(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        payload: &UpdateEmployeeSettings,
    ) -> Result<Employee, StatusEngineError> {
        validate_duration("pomodoro_work_time", payload.pomodoro_work_time)?;
        validate_duration("pomodoro_rest_time", payload.pomodoro_rest_time)?;

        retry_on_sqlite_busy(move || self.try_update_settings(caller, employee_id, payload)).await
    }

    async fn set_plain_status(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        status: EmployeeStatus,
    ) -> Result<Employee, StatusEngineError> {
        let employee = retry_on_sqlite_busy(move || {
            self.try_set_plain_status(caller, employee_id, status)
        })
        .await?;
        tracing::info!(employee_id = %employee_id, status = %status, "employee status changed");
        Ok(employee)
    }

    async fn try_enter_project(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        project_id: Uuid,
    ) -> Result<Employee, StatusEngineError> {
        let tx = self.db.pool.begin().await?;
        let employee = claim_owned_employee(&tx, caller, employee_id).await?;
        // Shared lock: a concurrent deactivation or delete of the project
        // waits for this transition, and this one sees its result otherwise.
        let project = Project::find_model_by_id_shared(&tx, project_id)
            .await?
            .ok_or(StatusEngineError::ProjectNotFound)?;
        if project.status != ProjectStatus::Active {
            return Err(StatusEngineError::ProjectNotActive);
        }

        let now = Utc::now();
        Note::append(
            &tx,
            employee.id,
            NewNote {
                title: PROJECT_ENTRY_TITLE.to_string(),
                content: Some(format!("You entered the project {}", project.name)),
                note_type: NoteType::Project,
                project_row_id: Some(project.id),
                deadline: Some(default_deadline(now, self.note_deadline_hour)),
            },
        )
        .await?;

        commit_transition(
            tx,
            &employee,
            EmployeeTransition {
                status: EmployeeStatus::Project,
                current_project_id: Some(project.id),
                at: now,
            },
        )
        .await
    }

    async fn try_exit_project(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        task_description: Option<&str>,
    ) -> Result<Employee, StatusEngineError> {
        let tx = self.db.pool.begin().await?;
        let employee = claim_owned_employee(&tx, caller, employee_id).await?;
        let now = Utc::now();

        if let Some(project_row_id) = employee.current_project_id {
            match Project::find_model_by_row_id(&tx, project_row_id).await? {
                Some(project) => {
                    let description = task_description
                        .map(str::trim)
                        .filter(|description| !description.is_empty());
                    if let Some(description) = description {
                        Task::create_in_project(
                            &tx,
                            &project,
                            description,
                            None,
                            caller.user_id,
                            Uuid::new_v4(),
                        )
                        .await?;
                    }

                    Note::append(
                        &tx,
                        employee.id,
                        NewNote {
                            title: PROJECT_EXIT_TITLE.to_string(),
                            content: Some(format!("You left the project {}", project.name)),
                            note_type: NoteType::Project,
                            project_row_id: Some(project.id),
                            deadline: Some(default_deadline(now, self.note_deadline_hour)),
                        },
                    )
                    .await?;
                }
                None => {
                    tracing::warn!(
                        employee_id = %employee_id,
                        project_row_id,
                        "current project no longer exists, skipping exit records"
                    );
                }
            }
        }

        commit_transition(
            tx,
            &employee,
            EmployeeTransition {
                status: EmployeeStatus::Rest,
                current_project_id: None,
                at: now,
            },
        )
        .await
    }

    async fn try_set_plain_status(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        status: EmployeeStatus,
    ) -> Result<Employee, StatusEngineError> {
        let tx = self.db.pool.begin().await?;
        let employee = claim_owned_employee(&tx, caller, employee_id).await?;
        commit_transition(
            tx,
            &employee,
            EmployeeTransition {
                status,
                current_project_id: None,
                at: Utc::now(),
            },
        )
        .await
    }

    async fn try_update_settings(
        &self,
        caller: &Caller,
        employee_id: Uuid,
        payload: &UpdateEmployeeSettings,
    ) -> Result<Employee, StatusEngineError> {
        let tx = self.db.pool.begin().await?;
        let employee = claim_owned_employee(&tx, caller, employee_id).await?;
        let applied =
            Employee::update_settings_if_version(&tx, employee.id, employee.version, payload)
                .await?;
        if !applied {
            tx.rollback().await?;
            return Err(StatusEngineError::ConcurrentUpdate);
        }
        let updated = reload(&tx, employee.id).await?;
        tx.commit().await?;
        Ok(updated)
    }
}

fn validate_duration(field: &str, minutes: Option<i32>) -> Result<(), StatusEngineError> {
    match minutes {
        Some(value) if !(1..=MAX_DURATION_MINUTES).contains(&value) => {
            Err(StatusEngineError::InvalidSettings(format!(
                "{field} must be between 1 and {MAX_DURATION_MINUTES} minutes"
            )))
        }
        _ => Ok(()),
    }
}

/// Write-locks the employee row, then loads it and checks the caller owns it.
/// Locking first serializes transitions of one employee.
async fn claim_owned_employee(
    tx: &DatabaseTransaction,
    caller: &Caller,
    employee_id: Uuid,
) -> Result<employee_entity::Model, StatusEngineError> {
    if !Employee::lock_for_write(tx, employee_id).await? {
        return Err(StatusEngineError::EmployeeNotFound);
    }
    let employee = Employee::find_model_by_id(tx, employee_id)
        .await?
        .ok_or(StatusEngineError::EmployeeNotFound)?;
    if employee.user_id != caller.user_id {
        return Err(AuthError::Forbidden(
            "Employees can only change their own status".to_string(),
        )
        .into());
    }
    Ok(employee)
}

async fn reload(tx: &DatabaseTransaction, row_id: i64) -> Result<Employee, StatusEngineError> {
    let model = Employee::find_model_by_row_id(tx, row_id)
        .await?
        .ok_or(StatusEngineError::EmployeeNotFound)?;
    Ok(Employee::hydrate(tx, model).await?)
}

async fn commit_transition(
    tx: DatabaseTransaction,
    employee: &employee_entity::Model,
    transition: EmployeeTransition,
) -> Result<Employee, StatusEngineError> {
    let applied =
        Employee::apply_transition_if_version(&tx, employee.id, employee.version, transition)
            .await?;
    if !applied {
        tx.rollback().await?;
        tracing::debug!(employee_id = %employee.uuid, "stale employee version");
        return Err(StatusEngineError::ConcurrentUpdate);
    }
    let updated = reload(&tx, employee.id).await?;
    tx.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use db::models::{
        employee::{CreateEmployee, EmployeeDefaults},
        ids,
        project::{CreateProject, UpdateProject},
        task::TaskStatus,
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::services::{
        auth::UserRole,
        project::{ProjectService, ProjectServiceError},
    };

    async fn setup_db() -> DBService {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&pool, None).await.unwrap();
        DBService { pool }
    }

    async fn seed_employee(db: &DBService, user_id: i64) -> Employee {
        Employee::create(
            &db.pool,
            &CreateEmployee::named(format!("Employee {user_id}")),
            user_id,
            EmployeeDefaults::default(),
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    async fn seed_project(db: &DBService, name: &str) -> Project {
        Project::create(&db.pool, &CreateProject::named(name), 1, Uuid::new_v4())
            .await
            .unwrap()
    }

    async fn notes_of(db: &DBService, employee: &Employee) -> Vec<Note> {
        let row_id = ids::employee_id_by_uuid(&db.pool, employee.id)
            .await
            .unwrap()
            .unwrap();
        Note::find_by_employee(&db.pool, row_id, employee.id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enter_project_sets_state_and_writes_entry_note() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let project = seed_project(&db, "Website").await;
        let caller = Caller::new(7, UserRole::Employee);

        let before = Utc::now();
        let updated = engine
            .enter_project(&caller, employee.id, project.id)
            .await
            .unwrap();

        assert_eq!(updated.status, EmployeeStatus::Project);
        assert_eq!(updated.current_project_id, Some(project.id));
        assert!(updated.state_start_time.unwrap() >= before);
        assert_eq!(updated.version, 1);

        let notes = notes_of(&db, &employee).await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, PROJECT_ENTRY_TITLE);
        assert_eq!(notes[0].note_type, NoteType::Project);
        assert_eq!(notes[0].project_id, Some(project.id));
    }

    #[tokio::test]
    async fn enter_project_rejects_missing_inactive_and_foreign() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let project = seed_project(&db, "Website").await;
        let owner = Caller::new(7, UserRole::Employee);

        let stranger = engine
            .enter_project(&Caller::new(8, UserRole::Admin), employee.id, project.id)
            .await;
        assert!(matches!(
            stranger,
            Err(StatusEngineError::Auth(AuthError::Forbidden(_)))
        ));

        let missing_employee = engine
            .enter_project(&owner, Uuid::new_v4(), project.id)
            .await;
        assert!(matches!(
            missing_employee,
            Err(StatusEngineError::EmployeeNotFound)
        ));

        let missing_project = engine
            .enter_project(&owner, employee.id, Uuid::new_v4())
            .await;
        assert!(matches!(
            missing_project,
            Err(StatusEngineError::ProjectNotFound)
        ));

        Project::update(
            &db.pool,
            project.id,
            &UpdateProject {
                status: Some(ProjectStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let inactive = engine.enter_project(&owner, employee.id, project.id).await;
        assert!(matches!(inactive, Err(StatusEngineError::ProjectNotActive)));

        let unchanged = Employee::find_by_id(&db.pool, employee.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.status, EmployeeStatus::Inactive);
        assert_eq!(unchanged.version, 0);
        assert!(notes_of(&db, &employee).await.is_empty());
    }

    #[tokio::test]
    async fn exit_project_with_task_creates_task_and_exit_note() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let project = seed_project(&db, "Website").await;
        let caller = Caller::new(7, UserRole::Employee);

        engine
            .enter_project(&caller, employee.id, project.id)
            .await
            .unwrap();
        let rested = engine
            .exit_project(&caller, employee.id, Some("  Finish report ".to_string()))
            .await
            .unwrap();

        assert_eq!(rested.status, EmployeeStatus::Rest);
        assert_eq!(rested.current_project_id, None);
        assert_eq!(rested.version, 2);

        let tasks = Task::find_by_project_id(&db.pool, project.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "Finish report");
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert_eq!(tasks[0].created_by, 7);

        let notes = notes_of(&db, &employee).await;
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().any(|note| note.title == PROJECT_EXIT_TITLE
            && note.project_id == Some(project.id)));
    }

    #[tokio::test]
    async fn exit_project_with_blank_description_skips_task() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let project = seed_project(&db, "Website").await;
        let caller = Caller::new(7, UserRole::Employee);

        engine
            .enter_project(&caller, employee.id, project.id)
            .await
            .unwrap();
        engine
            .exit_project(&caller, employee.id, Some("   ".to_string()))
            .await
            .unwrap();

        assert!(Task::find_by_project_id(&db.pool, project.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(notes_of(&db, &employee).await.len(), 2);
    }

    #[tokio::test]
    async fn exit_project_without_description_skips_task() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let project = seed_project(&db, "Website").await;
        let caller = Caller::new(7, UserRole::Employee);

        for description in [None, Some(String::new())] {
            engine
                .enter_project(&caller, employee.id, project.id)
                .await
                .unwrap();
            let rested = engine
                .exit_project(&caller, employee.id, description)
                .await
                .unwrap();
            assert_eq!(rested.status, EmployeeStatus::Rest);
            assert_eq!(rested.current_project_id, None);
        }

        assert!(Task::find_by_project_id(&db.pool, project.id)
            .await
            .unwrap()
            .is_empty());
        let notes = notes_of(&db, &employee).await;
        assert_eq!(notes.len(), 4);
        assert_eq!(
            notes
                .iter()
                .filter(|note| note.title == PROJECT_EXIT_TITLE)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn exit_without_project_is_plain_rest() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let caller = Caller::new(7, UserRole::Employee);

        let rested = engine
            .exit_project(&caller, employee.id, Some("ignored".to_string()))
            .await
            .unwrap();
        assert_eq!(rested.status, EmployeeStatus::Rest);
        assert_eq!(rested.current_project_id, None);
        assert!(notes_of(&db, &employee).await.is_empty());
    }

    #[tokio::test]
    async fn rest_meeting_and_inactive_clear_project_without_notes() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let project = seed_project(&db, "Website").await;
        let caller = Caller::new(7, UserRole::Employee);

        engine
            .enter_project(&caller, employee.id, project.id)
            .await
            .unwrap();
        let meeting = engine.enter_meeting(&caller, employee.id).await.unwrap();
        assert_eq!(meeting.status, EmployeeStatus::Meeting);
        assert_eq!(meeting.current_project_id, None);

        let rest = engine.enter_rest(&caller, employee.id).await.unwrap();
        assert_eq!(rest.status, EmployeeStatus::Rest);

        let inactive = engine.go_inactive(&caller, employee.id).await.unwrap();
        assert_eq!(inactive.status, EmployeeStatus::Inactive);
        assert_eq!(inactive.version, 4);

        // Only the project entry wrote a note.
        assert_eq!(notes_of(&db, &employee).await.len(), 1);
    }

    #[tokio::test]
    async fn settings_are_bounded_and_leave_state_alone() {
        let db = setup_db().await;
        let engine = StatusEngine::new(db.clone(), 18);
        let employee = seed_employee(&db, 7).await;
        let caller = Caller::new(7, UserRole::Employee);

        for minutes in [0, -5, MAX_DURATION_MINUTES + 1] {
            let result = engine
                .update_settings(
                    &caller,
                    employee.id,
                    &UpdateEmployeeSettings {
                        pomodoro_work_time: Some(minutes),
                        ..Default::default()
                    },
                )
                .await;
            assert!(matches!(result, Err(StatusEngineError::InvalidSettings(_))));
        }

        let updated = engine
            .update_settings(
                &caller,
                employee.id,
                &UpdateEmployeeSettings {
                    pomodoro_work_time: Some(50),
                    pomodoro_rest_time: Some(10),
                    specialties: Some("Rust".to_string()),
                    qualities: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.pomodoro_work_time, 50);
        assert_eq!(updated.pomodoro_rest_time, 10);
        assert_eq!(updated.specialties.as_deref(), Some("Rust"));
        assert_eq!(updated.status, EmployeeStatus::Inactive);
        assert!(notes_of(&db, &employee).await.is_empty());

        let foreign = engine
            .update_settings(
                &Caller::new(99, UserRole::Employee),
                employee.id,
                &UpdateEmployeeSettings::default(),
            )
            .await;
        assert!(matches!(foreign, Err(StatusEngineError::Auth(_))));
    }

    #[tokio::test]
    async fn concurrent_transitions_wait_for_each_other() {
        let temp = test_support::TempDatabase::new().unwrap();
        let db = DBService::connect(&temp.url()).await.unwrap();
        let engine = Arc::new(StatusEngine::new(db.clone(), 18));
        let employee = seed_employee(&db, 7).await;
        let project = seed_project(&db, "Website").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let employee_id = employee.id;
            let project_id = project.id;
            handles.push(tokio::spawn(async move {
                let caller = Caller::new(7, UserRole::Employee);
                engine.enter_project(&caller, employee_id, project_id).await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = Employee::find_by_id(&db.pool, employee.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 8);
        assert_eq!(stored.status, EmployeeStatus::Project);
        assert_eq!(notes_of(&db, &employee).await.len(), 8);
    }

    #[tokio::test]
    async fn racing_deactivation_never_strands_an_employee() {
        let temp = test_support::TempDatabase::new().unwrap();
        let db = DBService::connect(&temp.url()).await.unwrap();
        let engine = StatusEngine::new(db.clone(), 18);
        let projects = ProjectService::new(db.clone());
        let employee = seed_employee(&db, 7).await;
        let worker = Caller::new(7, UserRole::Employee);
        let admin = Caller::new(1, UserRole::Admin);

        for round in 0..5 {
            engine.enter_rest(&worker, employee.id).await.unwrap();
            let project = seed_project(&db, &format!("Round {round}")).await;
            let deactivate = UpdateProject {
                status: Some(ProjectStatus::Completed),
                ..Default::default()
            };

            let (entered, updated) = tokio::join!(
                engine.enter_project(&worker, employee.id, project.id),
                projects.update(&admin, project.id, &deactivate),
            );
            match entered {
                Ok(_) | Err(StatusEngineError::ProjectNotActive) => {}
                Err(other) => panic!("unexpected transition error: {other}"),
            }
            match updated {
                Ok(_) | Err(ProjectServiceError::EmployeesClockedIn(_)) => {}
                Err(other) => panic!("unexpected update error: {other}"),
            }

            let stored = Employee::find_by_id(&db.pool, employee.id)
                .await
                .unwrap()
                .unwrap();
            let project = Project::find_by_id(&db.pool, project.id)
                .await
                .unwrap()
                .unwrap();
            if stored.current_project_id == Some(project.id) {
                assert_eq!(project.status, ProjectStatus::Active);
            }
        }
    }
}
