use crate::entity::shift;
use crate::error::ServiceError;
use crate::services::{Caller, ensure_clinic_doctor, ensure_window, new_id};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShiftDto {
    pub doctor_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShiftView {
    pub id: String,
    pub doctor_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
}

impl From<shift::Model> for ShiftView {
    fn from(s: shift::Model) -> Self {
        Self {
            id: s.id,
            doctor_id: s.doctor_id,
            starts_at: s.starts_at,
            ends_at: s.ends_at,
        }
    }
}

pub struct ShiftsService {
    db: Arc<DatabaseConnection>,
}

impl ShiftsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_shift(&self, caller: &Caller, shift_id: &str) -> Result<shift::Model, ServiceError> {
        let clinic_id = caller.clinic_id()?;
        shift::Entity::find_by_id(shift_id)
            .filter(shift::Column::IsDeleted.eq(false))
            .filter(shift::Column::ClinicId.eq(clinic_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("shift"))
    }

    /// Conflict if another live shift of the doctor intersects the window.
    async fn ensure_no_overlap(
        &self,
        clinic_id: &str,
        doctor_id: &str,
        starts_at: OffsetDateTime,
        ends_at: OffsetDateTime,
        ignore_id: Option<&str>,
    ) -> Result<(), ServiceError> {
        let candidates = shift::Entity::find()
            .filter(shift::Column::DoctorId.eq(doctor_id))
            .filter(shift::Column::ClinicId.eq(clinic_id))
            .filter(shift::Column::IsDeleted.eq(false))
            .filter(shift::Column::StartsAt.lt(ends_at))
            .filter(shift::Column::EndsAt.gt(starts_at))
            .all(self.db.as_ref())
            .await?;
        let clash = candidates
            .iter()
            .filter(|s| Some(s.id.as_str()) != ignore_id)
            .find(|s| s.overlaps(starts_at, ends_at));
        if let Some(other) = clash {
            return Err(ServiceError::Conflict(format!(
                "shift overlaps existing shift {}",
                other.id
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, caller, dto), fields(caller = %caller.user_id))]
    pub async fn create_shift(
        &self,
        caller: &Caller,
        dto: ShiftDto,
    ) -> Result<ShiftView, ServiceError> {
        let (starts_at, ends_at) = ensure_window(dto.starts_at, dto.ends_at)?;
        let clinic_id = caller.clinic_id()?;
        ensure_clinic_doctor(self.db.as_ref(), clinic_id, &dto.doctor_id).await?;
        self.ensure_no_overlap(clinic_id, &dto.doctor_id, starts_at, ends_at, None)
            .await?;
        let model = shift::ActiveModel {
            id: Set(new_id()),
            doctor_id: Set(dto.doctor_id),
            starts_at: Set(starts_at),
            ends_at: Set(ends_at),
            clinic_id: Set(Some(clinic_id.to_string())),
            created_at: Set(OffsetDateTime::now_utc()),
            created_by: Set(caller.user_id.clone()),
            last_modified_at: Set(None),
            last_modified_by: Set(None),
            is_deleted: Set(false),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(model.into())
    }

    #[tracing::instrument(skip(self, caller, dto), fields(caller = %caller.user_id))]
    pub async fn update_shift(
        &self,
        caller: &Caller,
        shift_id: &str,
        dto: ShiftDto,
    ) -> Result<ShiftView, ServiceError> {
        let (starts_at, ends_at) = ensure_window(dto.starts_at, dto.ends_at)?;
        let clinic_id = caller.clinic_id()?;
        let existing = self.find_shift(caller, shift_id).await?;
        ensure_clinic_doctor(self.db.as_ref(), clinic_id, &dto.doctor_id).await?;
        self.ensure_no_overlap(clinic_id, &dto.doctor_id, starts_at, ends_at, Some(&existing.id))
            .await?;
        let mut active: shift::ActiveModel = existing.into();
        active.doctor_id = Set(dto.doctor_id);
        active.starts_at = Set(starts_at);
        active.ends_at = Set(ends_at);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        Ok(active.update(self.db.as_ref()).await?.into())
    }

    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn delete_shift(&self, caller: &Caller, shift_id: &str) -> Result<(), ServiceError> {
        let mut active: shift::ActiveModel = self.find_shift(caller, shift_id).await?.into();
        active.is_deleted = Set(true);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn get_shift(&self, caller: &Caller, shift_id: &str) -> Result<ShiftView, ServiceError> {
        Ok(self.find_shift(caller, shift_id).await?.into())
    }

    pub async fn list_for_doctor(
        &self,
        caller: &Caller,
        doctor_id: &str,
    ) -> Result<Vec<ShiftView>, ServiceError> {
        let clinic_id = caller.clinic_id()?;
        let rows = shift::Entity::find()
            .filter(shift::Column::DoctorId.eq(doctor_id))
            .filter(shift::Column::ClinicId.eq(clinic_id))
            .filter(shift::Column::IsDeleted.eq(false))
            .order_by_asc(shift::Column::StartsAt)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(ShiftView::from).collect())
    }
}
