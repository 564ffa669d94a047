use crate::entity::application_user::{self, normalize_user_name};
use crate::entity::user_role::{self, ROLE_ADMIN, ROLE_DOCTOR, ROLE_INDIVIDUAL, ROLE_PATIENT};
use crate::error::ServiceError;
use crate::oauth2::hash_password;
use crate::services::clinics::{ClinicsService, insert_default_clinic};
use crate::services::user_cards::insert_card;
use crate::services::{Caller, new_id};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Date, OffsetDateTime, macros::format_description};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterUserDto {
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password: String,
    /// Practitioner working on their own; gets a private clinic.
    #[serde(default)]
    pub is_individual: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserDto {
    pub clinic_id: String,
    pub register: RegisterUserDto,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePatientDto {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    /// `YYYY-MM-DD`
    pub birth_date: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BasicInfoDto {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BasicUserInfoDto {
    pub user_id: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub clinic_name: Option<String>,
}

/// Patient created by staff: the generated username and the card opened for them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedPatientDto {
    pub user_id: String,
    pub user_name: String,
    pub user_card_id: String,
}

pub struct UsersService {
    db: Arc<DatabaseConnection>,
}

struct NewUser {
    user_name: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone_number: Option<String>,
    birth_date: Option<Date>,
    password: Option<String>,
    clinic_id: Option<String>,
    role: &'static str,
}

impl UsersService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn user_name_taken(&self, user_name: &str) -> Result<bool, ServiceError> {
        let count = application_user::Entity::find()
            .filter(
                application_user::Column::NormalizedUserName.eq(normalize_user_name(user_name)),
            )
            .count(self.db.as_ref())
            .await?;
        Ok(count > 0)
    }

    /// Insert the user and its first role.
    async fn insert_user<C: ConnectionTrait>(
        conn: &C,
        new: NewUser,
    ) -> Result<application_user::Model, ServiceError> {
        let password_hash = match new.password.as_deref() {
            Some(p) => Some(hash_password(p)?),
            None => None,
        };
        let taken = format!("user name '{}' is taken", new.user_name);
        let user = application_user::ActiveModel {
            id: Set(new_id()),
            normalized_user_name: Set(normalize_user_name(&new.user_name)),
            user_name: Set(new.user_name),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            email: Set(new.email),
            phone_number: Set(new.phone_number),
            birth_date: Set(new.birth_date),
            password_hash: Set(password_hash),
            clinic_id: Set(new.clinic_id),
            created_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(conn)
        .await
        .map_err(|e| ServiceError::unique(e, taken))?;
        add_role(conn, &user.id, new.role).await?;
        Ok(user)
    }

    fn validate_registration(dto: &RegisterUserDto) -> Result<(), ServiceError> {
        if dto.user_name.trim().is_empty() {
            return Err(ServiceError::Validation("user_name is required".into()));
        }
        if dto.password.len() < 8 {
            return Err(ServiceError::Validation(
                "password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }

    /// Self-service registration of a clinic owner or an individual practitioner.
    #[tracing::instrument(skip(self, dto), fields(user_name = %dto.user_name))]
    pub async fn register(&self, dto: RegisterUserDto) -> Result<BasicUserInfoDto, ServiceError> {
        Self::validate_registration(&dto)?;
        if self.user_name_taken(&dto.user_name).await? {
            return Err(ServiceError::Conflict(format!(
                "user name '{}' is taken",
                dto.user_name
            )));
        }

        let txn = self.db.begin().await?;
        let (clinic_id, role) = if dto.is_individual {
            (Some(insert_default_clinic(&txn).await?), ROLE_INDIVIDUAL)
        } else {
            (None, ROLE_ADMIN)
        };

        let user = Self::insert_user(
            &txn,
            NewUser {
                user_name: dto.user_name,
                first_name: dto.first_name,
                last_name: dto.last_name,
                email: dto.email,
                phone_number: dto.phone_number,
                birth_date: None,
                password: Some(dto.password),
                clinic_id,
                role,
            },
        )
        .await?;
        txn.commit().await?;
        tracing::info!(user_id = %user.id, role, "Registered user");
        self.get_user_by_id(&user.id).await
    }

    /// Staff account (doctor) inside an existing clinic.
    #[tracing::instrument(skip(self, dto), fields(user_name = %dto.register.user_name))]
    pub async fn create_user(&self, dto: CreateUserDto) -> Result<BasicUserInfoDto, ServiceError> {
        Self::validate_registration(&dto.register)?;
        if self.user_name_taken(&dto.register.user_name).await? {
            return Err(ServiceError::Conflict(format!(
                "user name '{}' is taken",
                dto.register.user_name
            )));
        }
        let clinic = ClinicsService::new(self.db.clone())
            .find_clinic(&dto.clinic_id)
            .await?;

        let register = dto.register;
        let txn = self.db.begin().await?;
        let user = Self::insert_user(
            &txn,
            NewUser {
                user_name: register.user_name,
                first_name: register.first_name,
                last_name: register.last_name,
                email: register.email,
                phone_number: register.phone_number,
                birth_date: None,
                password: Some(register.password),
                clinic_id: Some(clinic.id),
                role: ROLE_DOCTOR,
            },
        )
        .await?;
        txn.commit().await?;
        self.get_user_by_id(&user.id).await
    }

    /// Patient registered by clinic staff. Patients have no password and get a card.
    #[tracing::instrument(skip(self, caller, dto))]
    pub async fn create_patient(
        &self,
        caller: &Caller,
        dto: CreatePatientDto,
    ) -> Result<CreatedPatientDto, ServiceError> {
        let birth_date = Date::parse(&dto.birth_date, format_description!("[year]-[month]-[day]"))
            .map_err(|e| ServiceError::Validation(format!("birth_date: {e}")))?;
        if dto.first_name.trim().is_empty() {
            return Err(ServiceError::Validation("first_name is required".into()));
        }
        let clinic_id = caller.clinic_id()?.to_string();

        let mut user_name = patient_user_name(&dto.first_name, birth_date);
        if self.user_name_taken(&user_name).await? {
            let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..6].to_string();
            user_name = format!("{user_name}_{suffix}");
        }

        let txn = self.db.begin().await?;
        let user = Self::insert_user(
            &txn,
            NewUser {
                user_name,
                first_name: dto.first_name,
                last_name: dto.last_name,
                email: None,
                phone_number: dto.phone_number,
                birth_date: Some(birth_date),
                password: None,
                clinic_id: Some(clinic_id),
                role: ROLE_PATIENT,
            },
        )
        .await?;
        let card = insert_card(&txn, caller, &user.id, None).await?;
        txn.commit().await?;

        Ok(CreatedPatientDto {
            user_id: user.id,
            user_name: user.user_name,
            user_card_id: card.id,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<BasicUserInfoDto, ServiceError> {
        let (user, clinic) = application_user::Entity::find_by_id(user_id)
            .find_also_related(crate::entity::clinic::Entity)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;
        Ok(BasicUserInfoDto {
            user_id: user.id,
            user_name: user.user_name,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone_number: user.phone_number,
            clinic_name: clinic.filter(|c| !c.is_deleted).map(|c| c.name),
        })
    }

    /// A user of the caller's own clinic (or the caller themselves).
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn get_clinic_user(
        &self,
        caller: &Caller,
        user_id: &str,
    ) -> Result<BasicUserInfoDto, ServiceError> {
        if caller.user_id != user_id {
            let clinic_id = caller.clinic_id()?;
            application_user::Entity::find_by_id(user_id)
                .filter(application_user::Column::ClinicId.eq(clinic_id))
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| ServiceError::not_found("user"))?;
        }
        self.get_user_by_id(user_id).await
    }

    /// Attach a clinic owner to the clinic they just created.
    pub async fn assign_clinic(&self, user_id: &str, clinic_id: &str) -> Result<(), ServiceError> {
        let user = application_user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;
        if user.clinic_id.is_some() {
            return Err(ServiceError::Conflict("user already belongs to a clinic".into()));
        }
        let mut active: application_user::ActiveModel = user.into();
        active.clinic_id = Set(Some(clinic_id.to_string()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, dto))]
    pub async fn change_basic_info(
        &self,
        user_id: &str,
        dto: BasicInfoDto,
    ) -> Result<BasicUserInfoDto, ServiceError> {
        let user = application_user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;
        let mut active: application_user::ActiveModel = user.into();
        active.first_name = Set(dto.first_name);
        active.last_name = Set(dto.last_name);
        active.email = Set(dto.email);
        active.phone_number = Set(dto.phone_number);
        active.update(self.db.as_ref()).await?;
        self.get_user_by_id(user_id).await
    }
}

/// Append a role after the ones the user already holds.
async fn add_role<C: ConnectionTrait>(conn: &C, user_id: &str, role: &str) -> Result<(), ServiceError> {
    let position = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .count(conn)
        .await?;
    user_role::ActiveModel {
        user_id: Set(user_id.to_string()),
        role: Set(role.to_string()),
        position: Set(position as i32),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// `{first_name}_{yyyyMMdd}`
fn patient_user_name(first_name: &str, birth_date: Date) -> String {
    format!(
        "{}_{:04}{:02}{:02}",
        first_name.trim(),
        birth_date.year(),
        u8::from(birth_date.month()),
        birth_date.day()
    )
}
