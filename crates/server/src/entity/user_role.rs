//! Role assignments. `position` keeps the order roles were granted in.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_DOCTOR: &str = "Doctor";
pub const ROLE_PATIENT: &str = "Patient";
pub const ROLE_INDIVIDUAL: &str = "Individual";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_role")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub role: String,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::application_user::Entity",
        from = "Column::UserId",
        to = "super::application_user::Column::Id"
    )]
    User,
}

impl Related<super::application_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
