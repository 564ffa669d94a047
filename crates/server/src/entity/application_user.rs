//! Application user entity - staff, practitioners and patients.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application_user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_name: String,
    /// Uppercased `user_name`, used for case-insensitive lookups
    #[sea_orm(unique)]
    pub normalized_user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub birth_date: Option<Date>,
    /// Argon2 PHC string. Patients registered by staff have none.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub clinic_id: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::clinic::Entity",
        from = "Column::ClinicId",
        to = "super::clinic::Column::Id"
    )]
    Clinic,
    #[sea_orm(has_many = "super::user_role::Entity")]
    Roles,
}

impl Related<super::clinic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clinic.def()
    }
}

impl Related<super::user_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Roles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Normalize a username the way it is stored in `normalized_user_name`.
pub fn normalize_user_name(user_name: &str) -> String {
    user_name.to_uppercase()
}
