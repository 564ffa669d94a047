//! Clinic data: clinics, patient cards, disease records, appointments, shifts.
//!
//! Every row but `clinic` carries the audit columns (`created_*`,
//! `last_modified_*`) and the `is_deleted` soft-delete flag.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn audit_columns<T: IntoIden + Copy>(
    table: &mut TableCreateStatement,
    clinic_id: T,
    created_at: T,
    created_by: T,
    last_modified_at: T,
    last_modified_by: T,
    is_deleted: T,
) {
    table
        .col(ColumnDef::new(clinic_id).string().null())
        .col(
            ColumnDef::new(created_at)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(created_by).string().not_null())
        .col(ColumnDef::new(last_modified_at).timestamp_with_time_zone().null())
        .col(ColumnDef::new(last_modified_by).string().null())
        .col(
            ColumnDef::new(is_deleted)
                .boolean()
                .not_null()
                .default(false),
        );
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Clinic::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Clinic::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Clinic::Name).string().not_null())
                    .col(ColumnDef::new(Clinic::Address).string().null())
                    .col(ColumnDef::new(Clinic::PhoneNumber).string().null())
                    .col(
                        ColumnDef::new(Clinic::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Clinic::LastModifiedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Clinic::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        let mut user_card = Table::create()
            .table(UserCard::Table)
            .if_not_exists()
            .col(ColumnDef::new(UserCard::Id).string().not_null().primary_key())
            .col(ColumnDef::new(UserCard::UserId).string().not_null())
            .col(ColumnDef::new(UserCard::Notes).text().null())
            .to_owned();
        audit_columns(
            &mut user_card,
            UserCard::ClinicId,
            UserCard::CreatedAt,
            UserCard::CreatedBy,
            UserCard::LastModifiedAt,
            UserCard::LastModifiedBy,
            UserCard::IsDeleted,
        );
        manager.create_table(user_card).await?;

        let mut disease = Table::create()
            .table(Disease::Table)
            .if_not_exists()
            .col(ColumnDef::new(Disease::Id).string().not_null().primary_key())
            .col(ColumnDef::new(Disease::UserCardId).string().null())
            .col(ColumnDef::new(Disease::Name).string().not_null())
            .col(ColumnDef::new(Disease::Description).text().null())
            .to_owned();
        audit_columns(
            &mut disease,
            Disease::ClinicId,
            Disease::CreatedAt,
            Disease::CreatedBy,
            Disease::LastModifiedAt,
            Disease::LastModifiedBy,
            Disease::IsDeleted,
        );
        manager.create_table(disease).await?;

        let mut appointment = Table::create()
            .table(Appointment::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Appointment::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Appointment::UserCardId).string().not_null())
            .col(ColumnDef::new(Appointment::DoctorId).string().not_null())
            .col(
                ColumnDef::new(Appointment::StartsAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Appointment::EndsAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(Appointment::Description).text().null())
            .to_owned();
        audit_columns(
            &mut appointment,
            Appointment::ClinicId,
            Appointment::CreatedAt,
            Appointment::CreatedBy,
            Appointment::LastModifiedAt,
            Appointment::LastModifiedBy,
            Appointment::IsDeleted,
        );
        manager.create_table(appointment).await?;

        let mut shift = Table::create()
            .table(Shift::Table)
            .if_not_exists()
            .col(ColumnDef::new(Shift::Id).string().not_null().primary_key())
            .col(ColumnDef::new(Shift::DoctorId).string().not_null())
            .col(
                ColumnDef::new(Shift::StartsAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Shift::EndsAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .to_owned();
        audit_columns(
            &mut shift,
            Shift::ClinicId,
            Shift::CreatedAt,
            Shift::CreatedBy,
            Shift::LastModifiedAt,
            Shift::LastModifiedBy,
            Shift::IsDeleted,
        );
        manager.create_table(shift).await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_appointment_clinic_starts_at")
                    .table(Appointment::Table)
                    .col(Appointment::ClinicId)
                    .col(Appointment::StartsAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shift_doctor_starts_at")
                    .table(Shift::Table)
                    .col(Shift::DoctorId)
                    .col(Shift::StartsAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_disease_user_card_id")
                    .table(Disease::Table)
                    .col(Disease::UserCardId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Shift::Table.into_iden(),
            Appointment::Table.into_iden(),
            Disease::Table.into_iden(),
            UserCard::Table.into_iden(),
            Clinic::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Clinic {
    Table,
    Id,
    Name,
    Address,
    PhoneNumber,
    CreatedAt,
    LastModifiedAt,
    IsDeleted,
}

#[derive(DeriveIden, Clone, Copy)]
enum UserCard {
    Table,
    Id,
    UserId,
    Notes,
    ClinicId,
    CreatedAt,
    CreatedBy,
    LastModifiedAt,
    LastModifiedBy,
    IsDeleted,
}

#[derive(DeriveIden, Clone, Copy)]
enum Disease {
    Table,
    Id,
    UserCardId,
    Name,
    Description,
    ClinicId,
    CreatedAt,
    CreatedBy,
    LastModifiedAt,
    LastModifiedBy,
    IsDeleted,
}

#[derive(DeriveIden, Clone, Copy)]
enum Appointment {
    Table,
    Id,
    UserCardId,
    DoctorId,
    StartsAt,
    EndsAt,
    Description,
    ClinicId,
    CreatedAt,
    CreatedBy,
    LastModifiedAt,
    LastModifiedBy,
    IsDeleted,
}

#[derive(DeriveIden, Clone, Copy)]
enum Shift {
    Table,
    Id,
    DoctorId,
    StartsAt,
    EndsAt,
    ClinicId,
    CreatedAt,
    CreatedBy,
    LastModifiedAt,
    LastModifiedBy,
    IsDeleted,
}
