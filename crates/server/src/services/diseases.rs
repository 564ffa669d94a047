use crate::entity::disease;
use crate::error::ServiceError;
use crate::services::user_cards::UserCardsService;
use crate::services::{Caller, new_id};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDiseaseDto {
    pub user_card_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateDiseaseDto {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiseaseDto {
    pub id: String,
    pub user_card_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<disease::Model> for DiseaseDto {
    fn from(d: disease::Model) -> Self {
        Self {
            id: d.id,
            user_card_id: d.user_card_id,
            name: d.name,
            description: d.description,
            created_at: d.created_at,
        }
    }
}

pub struct DiseasesService {
    db: Arc<DatabaseConnection>,
}

impl DiseasesService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_disease(
        &self,
        caller: &Caller,
        disease_id: &str,
    ) -> Result<disease::Model, ServiceError> {
        let clinic_id = caller.clinic_id()?;
        disease::Entity::find_by_id(disease_id)
            .filter(disease::Column::IsDeleted.eq(false))
            .filter(disease::Column::ClinicId.eq(clinic_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("disease"))
    }

    #[tracing::instrument(skip(self, caller, dto), fields(caller = %caller.user_id))]
    pub async fn create_disease(
        &self,
        caller: &Caller,
        dto: CreateDiseaseDto,
    ) -> Result<DiseaseDto, ServiceError> {
        if dto.name.trim().is_empty() {
            return Err(ServiceError::Validation("disease name is required".into()));
        }
        let clinic_id = caller.clinic_id()?;
        if let Some(card_id) = dto.user_card_id.as_deref() {
            UserCardsService::new(self.db.clone())
                .find_card(caller, card_id)
                .await?;
        }
        let model = disease::ActiveModel {
            id: Set(new_id()),
            user_card_id: Set(dto.user_card_id),
            name: Set(dto.name.trim().to_string()),
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

    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn get_disease(
        &self,
        caller: &Caller,
        disease_id: &str,
    ) -> Result<DiseaseDto, ServiceError> {
        Ok(self.find_disease(caller, disease_id).await?.into())
    }

    pub async fn list_for_card(
        &self,
        caller: &Caller,
        card_id: &str,
    ) -> Result<Vec<DiseaseDto>, ServiceError> {
        let card = UserCardsService::new(self.db.clone())
            .find_card(caller, card_id)
            .await?;
        let rows = disease::Entity::find()
            .filter(disease::Column::UserCardId.eq(card.id))
            .filter(disease::Column::IsDeleted.eq(false))
            .order_by_asc(disease::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(DiseaseDto::from).collect())
    }

    #[tracing::instrument(skip(self, caller, dto), fields(caller = %caller.user_id))]
    pub async fn update_disease(
        &self,
        caller: &Caller,
        disease_id: &str,
        dto: UpdateDiseaseDto,
    ) -> Result<DiseaseDto, ServiceError> {
        if dto.name.trim().is_empty() {
            return Err(ServiceError::Validation("disease name is required".into()));
        }
        let mut active: disease::ActiveModel = self.find_disease(caller, disease_id).await?.into();
        active.name = Set(dto.name.trim().to_string());
        active.description = Set(dto.description);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        Ok(active.update(self.db.as_ref()).await?.into())
    }

    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn delete_disease(&self, caller: &Caller, disease_id: &str) -> Result<(), ServiceError> {
        let mut active: disease::ActiveModel = self.find_disease(caller, disease_id).await?.into();
        active.is_deleted = Set(true);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}
