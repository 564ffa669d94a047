use crate::entity::{disease, user_card};
use crate::error::ServiceError;
use crate::services::diseases::DiseaseDto;
use crate::services::{Caller, new_id};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserCardDto {
    pub user_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateUserCardDto {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCardDto {
    pub id: String,
    pub user_id: String,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub diseases: Vec<DiseaseDto>,
}

pub struct UserCardsService {
    db: Arc<DatabaseConnection>,
}

impl UserCardsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Live card belonging to the caller's clinic.
    pub(crate) async fn find_card(
        &self,
        caller: &Caller,
        card_id: &str,
    ) -> Result<user_card::Model, ServiceError> {
        let clinic_id = caller.clinic_id()?;
        user_card::Entity::find_by_id(card_id)
            .filter(user_card::Column::IsDeleted.eq(false))
            .filter(user_card::Column::ClinicId.eq(clinic_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("user card"))
    }

    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn create_user_card(
        &self,
        caller: &Caller,
        user_id: &str,
        notes: Option<String>,
    ) -> Result<UserCardDto, ServiceError> {
        let card = insert_card(self.db.as_ref(), caller, user_id, notes).await?;
        Ok(to_dto(card, Vec::new()))
    }

    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn get_user_card(
        &self,
        caller: &Caller,
        card_id: &str,
    ) -> Result<UserCardDto, ServiceError> {
        let card = self.find_card(caller, card_id).await?;
        let diseases = card
            .find_related(disease::Entity)
            .filter(disease::Column::IsDeleted.eq(false))
            .order_by_asc(disease::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(DiseaseDto::from)
            .collect();
        Ok(to_dto(card, diseases))
    }

    #[tracing::instrument(skip(self, caller, dto), fields(caller = %caller.user_id))]
    pub async fn update_user_card(
        &self,
        caller: &Caller,
        card_id: &str,
        dto: UpdateUserCardDto,
    ) -> Result<UserCardDto, ServiceError> {
        let mut active: user_card::ActiveModel = self.find_card(caller, card_id).await?.into();
        active.notes = Set(dto.notes);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        active.update(self.db.as_ref()).await?;
        self.get_user_card(caller, card_id).await
    }

    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn delete_user_card(&self, caller: &Caller, card_id: &str) -> Result<(), ServiceError> {
        let mut active: user_card::ActiveModel = self.find_card(caller, card_id).await?.into();
        active.is_deleted = Set(true);
        active.last_modified_at = Set(Some(OffsetDateTime::now_utc()));
        active.last_modified_by = Set(Some(caller.user_id.clone()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}

pub(crate) async fn insert_card<C: ConnectionTrait>(
    conn: &C,
    caller: &Caller,
    user_id: &str,
    notes: Option<String>,
) -> Result<user_card::Model, ServiceError> {
    let clinic_id = caller.clinic_id()?;
    let card = user_card::ActiveModel {
        id: Set(new_id()),
        user_id: Set(user_id.to_string()),
        notes: Set(notes),
        clinic_id: Set(Some(clinic_id.to_string())),
        created_at: Set(OffsetDateTime::now_utc()),
        created_by: Set(caller.user_id.clone()),
        last_modified_at: Set(None),
        last_modified_by: Set(None),
        is_deleted: Set(false),
    }
    .insert(conn)
    .await?;
    Ok(card)
}

fn to_dto(card: user_card::Model, diseases: Vec<DiseaseDto>) -> UserCardDto {
    UserCardDto {
        id: card.id,
        user_id: card.user_id,
        notes: card.notes,
        created_at: card.created_at,
        diseases,
    }
}
