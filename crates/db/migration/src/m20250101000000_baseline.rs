use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Projects::Table)
                    .col(pk_id_col(manager, Projects::Id))
                    .col(uuid_col(Projects::Uuid))
                    .col(ColumnDef::new(Projects::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Projects::ProjectType).string_len(64).not_null())
                    .col(fk_id_col(manager, Projects::OwnerId))
                    .col(ColumnDef::new(Projects::Scope).text())
                    .col(ColumnDef::new(Projects::Objectives).text())
                    .col(ColumnDef::new(Projects::Deliverables).text())
                    .col(ColumnDef::new(Projects::Contract).text())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("active")),
                    )
                    .col(timestamp_col(Projects::CreatedAt))
                    .col(timestamp_col(Projects::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(unique_index("idx_projects_uuid", Projects::Table, Projects::Uuid))
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Employees::Table)
                    .col(pk_id_col(manager, Employees::Id))
                    .col(uuid_col(Employees::Uuid))
                    .col(fk_id_col(manager, Employees::UserId))
                    .col(ColumnDef::new(Employees::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Employees::Photo).text())
                    .col(ColumnDef::new(Employees::Specialties).text())
                    .col(ColumnDef::new(Employees::Qualities).text())
                    .col(
                        ColumnDef::new(Employees::PomodoroWorkTime)
                            .integer()
                            .not_null()
                            .default(Expr::val(25)),
                    )
                    .col(
                        ColumnDef::new(Employees::PomodoroRestTime)
                            .integer()
                            .not_null()
                            .default(Expr::val(5)),
                    )
                    .col(fk_id_nullable_col(manager, Employees::CurrentProjectId))
                    .col(
                        ColumnDef::new(Employees::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("inactive")),
                    )
                    .col(timestamp_nullable_col(Employees::StateStartTime))
                    .col(timestamp_col(Employees::CreatedAt))
                    .col(timestamp_col(Employees::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(unique_index("idx_employees_uuid", Employees::Table, Employees::Uuid))
            .await?;

        manager
            .create_index(index(
                "idx_employees_current_project_id",
                Employees::Table,
                Employees::CurrentProjectId,
            ))
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(fk_id_col(manager, Tasks::ProjectId))
                    .col(ColumnDef::new(Tasks::Description).text().not_null())
                    .col(fk_id_col(manager, Tasks::CreatedBy))
                    .col(timestamp_nullable_col(Tasks::Deadline))
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("pending")),
                    )
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(unique_index("idx_tasks_uuid", Tasks::Table, Tasks::Uuid))
            .await?;

        manager
            .create_index(index("idx_tasks_project_id", Tasks::Table, Tasks::ProjectId))
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Notes::Table)
                    .col(pk_id_col(manager, Notes::Id))
                    .col(uuid_col(Notes::Uuid))
                    .col(fk_id_col(manager, Notes::EmployeeId))
                    .col(ColumnDef::new(Notes::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Notes::Content).text())
                    .col(ColumnDef::new(Notes::NoteType).string_len(32).not_null())
                    .col(fk_id_nullable_col(manager, Notes::ProjectId))
                    .col(timestamp_nullable_col(Notes::Deadline))
                    .col(timestamp_col(Notes::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(unique_index("idx_notes_uuid", Notes::Table, Notes::Uuid))
            .await?;

        manager
            .create_index(index("idx_notes_employee_id", Notes::Table, Notes::EmployeeId))
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(InviteLinks::Table)
                    .col(pk_id_col(manager, InviteLinks::Id))
                    .col(ColumnDef::new(InviteLinks::Token).string_len(255).not_null())
                    .col(fk_id_col(manager, InviteLinks::CreatedBy))
                    .col(fk_id_nullable_col(manager, InviteLinks::UsedBy))
                    .col(timestamp_nullable_col(InviteLinks::ExpiresAt))
                    .col(timestamp_col(InviteLinks::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(unique_index(
                "idx_invite_links_token",
                InviteLinks::Table,
                InviteLinks::Token,
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(drop_if_exists(InviteLinks::Table)).await?;
        manager.drop_table(drop_if_exists(Notes::Table)).await?;
        manager.drop_table(drop_if_exists(Tasks::Table)).await?;
        manager.drop_table(drop_if_exists(Employees::Table)).await?;
        manager.drop_table(drop_if_exists(Projects::Table)).await
    }
}

fn drop_if_exists<T: IntoTableRef>(table: T) -> TableDropStatement {
    Table::drop().table(table).if_exists().to_owned()
}

/// Row ids are `INTEGER` on SQLite so the primary key aliases the rowid, and
/// `BIGINT` elsewhere.
fn id_col<T: IntoIden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut def = ColumnDef::new(col);
    if manager.get_database_backend() == DatabaseBackend::Sqlite {
        def.integer();
    } else {
        def.big_integer();
    }
    def
}

fn pk_id_col<T: IntoIden>(manager: &SchemaManager, col: T) -> ColumnDef {
    id_col(manager, col)
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn fk_id_col<T: IntoIden>(manager: &SchemaManager, col: T) -> ColumnDef {
    id_col(manager, col).not_null().to_owned()
}

fn fk_id_nullable_col<T: IntoIden>(manager: &SchemaManager, col: T) -> ColumnDef {
    id_col(manager, col)
}

fn index<T, C>(name: &str, table: T, col: C) -> IndexCreateStatement
where
    T: IntoTableRef,
    C: IntoIndexColumn,
{
    Index::create()
        .if_not_exists()
        .name(name)
        .table(table)
        .col(col)
        .to_owned()
}

fn unique_index<T, C>(name: &str, table: T, col: C) -> IndexCreateStatement
where
    T: IntoTableRef,
    C: IntoIndexColumn,
{
    index(name, table, col).unique().to_owned()
}

fn uuid_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn timestamp_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn timestamp_nullable_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).timestamp().to_owned()
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Uuid,
    Name,
    ProjectType,
    OwnerId,
    Scope,
    Objectives,
    Deliverables,
    Contract,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Employees {
    Table,
    Id,
    Uuid,
    UserId,
    Name,
    Photo,
    Specialties,
    Qualities,
    PomodoroWorkTime,
    PomodoroRestTime,
    CurrentProjectId,
    Status,
    StateStartTime,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    ProjectId,
    Description,
    CreatedBy,
    Deadline,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Notes {
    Table,
    Id,
    Uuid,
    EmployeeId,
    Title,
    Content,
    NoteType,
    ProjectId,
    Deadline,
    CreatedAt,
}

#[derive(Iden)]
enum InviteLinks {
    Table,
    Id,
    Token,
    CreatedBy,
    UsedBy,
    ExpiresAt,
    CreatedAt,
}
