//! Patient card entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_card")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub notes: Option<String>,
    pub clinic_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub created_by: String,
    pub last_modified_at: Option<OffsetDateTime>,
    pub last_modified_by: Option<String>,
    pub is_deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::disease::Entity")]
    Diseases,
}

impl Related<super::disease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Diseases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
