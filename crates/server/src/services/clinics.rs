use crate::entity::clinic;
use crate::error::ServiceError;
use crate::services::new_id;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectionTrait, DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

pub const DEFAULT_CLINIC_NAME: &str = "My practice";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateClinicDto {
    pub name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClinicDto {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<clinic::Model> for ClinicDto {
    fn from(c: clinic::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            address: c.address,
            phone_number: c.phone_number,
            created_at: c.created_at,
        }
    }
}

pub struct ClinicsService {
    db: Arc<DatabaseConnection>,
}

impl ClinicsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_clinic(&self, dto: CreateClinicDto) -> Result<ClinicDto, ServiceError> {
        Ok(insert_clinic(self.db.as_ref(), dto).await?.into())
    }

    pub async fn find_clinic(&self, clinic_id: &str) -> Result<clinic::Model, ServiceError> {
        clinic::Entity::find_by_id(clinic_id)
            .one(self.db.as_ref())
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| ServiceError::not_found("clinic"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_clinic(&self, clinic_id: &str) -> Result<ClinicDto, ServiceError> {
        Ok(self.find_clinic(clinic_id).await?.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_clinic(
        &self,
        clinic_id: &str,
        dto: CreateClinicDto,
    ) -> Result<ClinicDto, ServiceError> {
        if dto.name.trim().is_empty() {
            return Err(ServiceError::Validation("clinic name is required".into()));
        }
        let mut active: clinic::ActiveModel = self.find_clinic(clinic_id).await?.into();
        active.name = Set(dto.name.trim().to_string());
        active.address = Set(dto.address);
        active.phone_number = Set(dto.phone_number);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        Ok(active.update(self.db.as_ref()).await?.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_clinic(&self, clinic_id: &str) -> Result<(), ServiceError> {
        let mut active: clinic::ActiveModel = self.find_clinic(clinic_id).await?.into();
        active.is_deleted = Set(true);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}

pub(crate) async fn insert_clinic<C: ConnectionTrait>(
    conn: &C,
    dto: CreateClinicDto,
) -> Result<clinic::Model, ServiceError> {
    if dto.name.trim().is_empty() {
        return Err(ServiceError::Validation("clinic name is required".into()));
    }
    let model = clinic::ActiveModel {
        id: Set(new_id()),
        name: Set(dto.name.trim().to_string()),
        address: Set(dto.address),
        phone_number: Set(dto.phone_number),
        created_at: Set(OffsetDateTime::now_utc()),
        last_modified_at: Set(None),
        is_deleted: Set(false),
    }
    .insert(conn)
    .await?;
    Ok(model)
}

/// Clinic for a practitioner registering on their own. Returns its id.
pub(crate) async fn insert_default_clinic<C: ConnectionTrait>(conn: &C) -> Result<String, ServiceError> {
    let clinic = insert_clinic(
        conn,
        CreateClinicDto {
            name: DEFAULT_CLINIC_NAME.to_string(),
            address: None,
            phone_number: None,
        },
    )
    .await?;
    Ok(clinic.id)
}
