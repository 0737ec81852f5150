use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::FullName).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::PhoneNumber).string().null())
                    .col(ColumnDef::new(Users::Role).text().not_null())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::Institution).string().null())
                    .col(ColumnDef::new(Users::PickupAddress).string().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Routes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Routes::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Routes::Name).string().not_null())
                    .col(ColumnDef::new(Routes::DriverId).string().null())
                    .col(ColumnDef::new(Routes::MaxCapacity).integer().not_null())
                    .col(ColumnDef::new(Routes::StartTime).time().not_null())
                    .col(
                        ColumnDef::new(Routes::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_routes_driver")
                            .from(Routes::Table, Routes::DriverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Enrollments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Enrollments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Enrollments::StudentId).string().not_null())
                    .col(ColumnDef::new(Enrollments::RouteId).string().not_null())
                    .col(
                        ColumnDef::new(Enrollments::MonthlyFeeCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Enrollments::DueDay).integer().not_null())
                    .col(
                        ColumnDef::new(Enrollments::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_student")
                            .from(Enrollments::Table, Enrollments::StudentId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_route")
                            .from(Enrollments::Table, Enrollments::RouteId)
                            .to(Routes::Table, Routes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Payments::EnrollmentId).string().not_null())
                    .col(ColumnDef::new(Payments::BillingMonth).date().not_null())
                    .col(
                        ColumnDef::new(Payments::AmountDueCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::Status)
                            .text()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Payments::ProcessedById).string().null())
                    .col(
                        ColumnDef::new(Payments::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_enrollment")
                            .from(Payments::Table, Payments::EnrollmentId)
                            .to(Enrollments::Table, Enrollments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // No foreign key on actor_id: audit rows outlive the users they mention
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLogs::ActorId).string().null())
                    .col(ColumnDef::new(AuditLogs::Action).string_len(50).not_null())
                    .col(
                        ColumnDef::new(AuditLogs::TargetTable)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuditLogs::TargetId).string().null())
                    .col(ColumnDef::new(AuditLogs::Changes).text().null())
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DailyPresence::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyPresence::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyPresence::StudentId).string().not_null())
                    .col(ColumnDef::new(DailyPresence::Date).date().not_null())
                    .col(
                        ColumnDef::new(DailyPresence::StatusIda)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(DailyPresence::StatusVolta)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(DailyPresence::Observation).text().null())
                    .col(
                        ColumnDef::new(DailyPresence::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_daily_presence_student")
                            .from(DailyPresence::Table, DailyPresence::StudentId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Target of the presence upsert's ON CONFLICT clause
        manager
            .create_index(
                Index::create()
                    .name("idx_daily_presence_student_date")
                    .table(DailyPresence::Table)
                    .col(DailyPresence::StudentId)
                    .col(DailyPresence::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_created_at")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyPresence::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Enrollments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Routes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    FullName,
    Email,
    PasswordHash,
    PhoneNumber,
    Role,
    IsActive,
    Institution,
    PickupAddress,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Routes {
    Table,
    Id,
    Name,
    DriverId,
    MaxCapacity,
    StartTime,
    IsActive,
}

#[derive(DeriveIden)]
enum Enrollments {
    Table,
    Id,
    StudentId,
    RouteId,
    MonthlyFeeCents,
    DueDay,
    IsActive,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    EnrollmentId,
    BillingMonth,
    AmountDueCents,
    Status,
    ProcessedById,
    PaidAt,
}

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    ActorId,
    Action,
    TargetTable,
    TargetId,
    Changes,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DailyPresence {
    Table,
    Id,
    StudentId,
    Date,
    StatusIda,
    StatusVolta,
    Observation,
    UpdatedAt,
}
