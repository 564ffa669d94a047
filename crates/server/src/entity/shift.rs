//! Doctor shift entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shift")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub doctor_id: String,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub clinic_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub created_by: String,
    pub last_modified_at: Option<OffsetDateTime>,
    pub last_modified_by: Option<String>,
    pub is_deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Half-open interval overlap check.
    pub fn overlaps(&self, starts_at: OffsetDateTime, ends_at: OffsetDateTime) -> bool {
        self.starts_at < ends_at && starts_at < self.ends_at
    }
}
