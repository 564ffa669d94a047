//! Disease record entity, optionally attached to a patient card.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "disease")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_card_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub clinic_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub created_by: String,
    pub last_modified_at: Option<OffsetDateTime>,
    pub last_modified_by: Option<String>,
    pub is_deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_card::Entity",
        from = "Column::UserCardId",
        to = "super::user_card::Column::Id"
    )]
    UserCard,
}

impl Related<super::user_card::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
