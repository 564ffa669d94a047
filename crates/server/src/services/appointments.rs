use crate::entity::appointment;
use crate::error::ServiceError;
use crate::services::user_cards::UserCardsService;
use crate::services::{Caller, ensure_clinic_doctor, ensure_window, new_id, to_utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AppointmentDto {
    pub user_card_id: String,
    pub doctor_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppointmentView {
    pub id: String,
    pub user_card_id: String,
    pub doctor_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub description: Option<String>,
}

impl From<appointment::Model> for AppointmentView {
    fn from(a: appointment::Model) -> Self {
        Self {
            id: a.id,
            user_card_id: a.user_card_id,
            doctor_id: a.doctor_id,
            starts_at: a.starts_at,
            ends_at: a.ends_at,
            description: a.description,
        }
    }
}

/// Paging and filters for listing appointments. Pages are zero-based.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppointmentQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub doctor_id: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[param(value_type = Option<String>, format = DateTime)]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[param(value_type = Option<String>, format = DateTime)]
    pub to: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppointmentPage {
    pub items: Vec<AppointmentView>,
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

pub struct AppointmentsService {
    db: Arc<DatabaseConnection>,
}

impl AppointmentsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_appointment(
        &self,
        caller: &Caller,
        appointment_id: &str,
    ) -> Result<appointment::Model, ServiceError> {
        let clinic_id = caller.clinic_id()?;
        appointment::Entity::find_by_id(appointment_id)
            .filter(appointment::Column::IsDeleted.eq(false))
            .filter(appointment::Column::ClinicId.eq(clinic_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("appointment"))
    }

    #[tracing::instrument(skip(self, caller, dto), fields(caller = %caller.user_id))]
    pub async fn create_appointment(
        &self,
        caller: &Caller,
        dto: AppointmentDto,
    ) -> Result<AppointmentView, ServiceError> {
        let (starts_at, ends_at) = ensure_window(dto.starts_at, dto.ends_at)?;
        let clinic_id = caller.clinic_id()?;
        UserCardsService::new(self.db.clone())
            .find_card(caller, &dto.user_card_id)
            .await?;
        ensure_clinic_doctor(self.db.as_ref(), clinic_id, &dto.doctor_id).await?;

        let model = appointment::ActiveModel {
            id: Set(new_id()),
            user_card_id: Set(dto.user_card_id),
            doctor_id: Set(dto.doctor_id),
            starts_at: Set(starts_at),
            ends_at: Set(ends_at),
            description: Set(dto.description),
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
    pub async fn update_appointment(
        &self,
        caller: &Caller,
        appointment_id: &str,
        dto: AppointmentDto,
    ) -> Result<AppointmentView, ServiceError> {
        let (starts_at, ends_at) = ensure_window(dto.starts_at, dto.ends_at)?;
        let existing = self.find_appointment(caller, appointment_id).await?;
        if existing.user_card_id != dto.user_card_id {
            UserCardsService::new(self.db.clone())
                .find_card(caller, &dto.user_card_id)
                .await?;
        }
        if existing.doctor_id != dto.doctor_id {
            ensure_clinic_doctor(self.db.as_ref(), caller.clinic_id()?, &dto.doctor_id).await?;
        }
        let mut active: appointment::ActiveModel = existing.into();
        active.user_card_id = Set(dto.user_card_id);
        active.doctor_id = Set(dto.doctor_id);
        active.starts_at = Set(starts_at);
        active.ends_at = Set(ends_at);
        active.description = Set(dto.description);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        Ok(active.update(self.db.as_ref()).await?.into())
    }

    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn delete_appointment(
        &self,
        caller: &Caller,
        appointment_id: &str,
    ) -> Result<(), ServiceError> {
        let mut active: appointment::ActiveModel =
            self.find_appointment(caller, appointment_id).await?.into();
        active.is_deleted = Set(true);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn get_appointment(
        &self,
        caller: &Caller,
        appointment_id: &str,
    ) -> Result<AppointmentView, ServiceError> {
        Ok(self.find_appointment(caller, appointment_id).await?.into())
    }

    /// Appointments of the caller's clinic ordered by start time.
    ///
    /// `from`/`to` select appointments that intersect the window.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn list_appointments(
        &self,
        caller: &Caller,
        query: AppointmentQuery,
    ) -> Result<AppointmentPage, ServiceError> {
        let clinic_id = caller.clinic_id()?;
        if let (Some(from), Some(to)) = (query.from, query.to) {
            ensure_window(from, to)?;
        }
        let from = query.from.map(to_utc);
        let to = query.to.map(to_utc);
        let page = query.page.unwrap_or(0);
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut select = appointment::Entity::find()
            .filter(appointment::Column::IsDeleted.eq(false))
            .filter(appointment::Column::ClinicId.eq(clinic_id));
        if let Some(doctor_id) = query.doctor_id {
            select = select.filter(appointment::Column::DoctorId.eq(doctor_id));
        }
        if let Some(from) = from {
            select = select.filter(appointment::Column::EndsAt.gt(from));
        }
        if let Some(to) = to {
            select = select.filter(appointment::Column::StartsAt.lt(to));
        }

        let paginator = select
            .order_by_asc(appointment::Column::StartsAt)
            .order_by_asc(appointment::Column::Id)
            .paginate(self.db.as_ref(), page_size);
        let totals = paginator.num_items_and_pages().await?;
        let items = paginator
            .fetch_page(page)
            .await?
            .into_iter()
            .map(AppointmentView::from)
            .collect();

        Ok(AppointmentPage {
            items,
            page,
            page_size,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }
}
