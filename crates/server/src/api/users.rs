//! User account endpoints.
//!
//! - `POST /register` - Anonymous self-registration
//! - `POST /` - Create a doctor account (Admin only)
//! - `POST /patients` - Register a patient in the caller's clinic
//! - `GET|PUT /me` - Read or edit the caller's own profile
//! - `GET /{id}` - Basic info of a user

use crate::AppResources;
use crate::api::auth::{ApiError, OAuth2Auth};
use crate::entity::user_role::ROLE_ADMIN;
use crate::services::UsersService;
use crate::services::users::{
    BasicInfoDto, BasicUserInfoDto, CreatePatientDto, CreateUserDto, CreatedPatientDto,
    RegisterUserDto,
};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const USERS_TAG: &str = "Users";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(create_user))
        .routes(routes!(create_patient))
        .routes(routes!(get_me, change_basic_info))
        .routes(routes!(get_user))
}

#[tracing::instrument(skip(resources, dto))]
#[utoipa::path(
    post,
    path = "/register",
    tag = USERS_TAG,
    operation_id = "Register User",
    summary = "Register a clinic owner or an individual practitioner",
    request_body = RegisterUserDto,
    responses(
        (status = 201, description = "User registered", body = BasicUserInfoDto),
        (status = 400, description = "Invalid registration data", body = ApiError),
        (status = 409, description = "User name is taken", body = ApiError),
    )
)]
async fn register(
    Extension(resources): Extension<AppResources>,
    Json(dto): Json<RegisterUserDto>,
) -> Result<(StatusCode, Json<BasicUserInfoDto>), ApiError> {
    let user = UsersService::new(resources.db.clone()).register(dto).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    post,
    path = "",
    tag = USERS_TAG,
    operation_id = "Create User",
    summary = "Create a doctor account in an existing clinic",
    security(("bearer_auth" = [])),
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "User created", body = BasicUserInfoDto),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Caller is not an Admin", body = ApiError),
        (status = 404, description = "Clinic not found", body = ApiError),
        (status = 409, description = "User name is taken", body = ApiError),
    )
)]
async fn create_user(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<CreateUserDto>,
) -> Result<(StatusCode, Json<BasicUserInfoDto>), ApiError> {
    auth.require_role(ROLE_ADMIN)?;
    if auth.clinic_id.as_deref() != Some(dto.clinic_id.as_str()) {
        return Err(ApiError::forbidden("Users can only be added to your own clinic"));
    }
    let user = UsersService::new(resources.db.clone()).create_user(dto).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    post,
    path = "/patients",
    tag = USERS_TAG,
    operation_id = "Create Patient",
    summary = "Register a patient and open their card",
    security(("bearer_auth" = [])),
    request_body = CreatePatientDto,
    responses(
        (status = 201, description = "Patient created", body = CreatedPatientDto),
        (status = 400, description = "Invalid patient data", body = ApiError),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Caller has no clinic", body = ApiError),
    )
)]
async fn create_patient(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<CreatePatientDto>,
) -> Result<(StatusCode, Json<CreatedPatientDto>), ApiError> {
    let patient = UsersService::new(resources.db.clone())
        .create_patient(&auth.caller(), dto)
        .await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/me",
    tag = USERS_TAG,
    operation_id = "Get Current User",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's profile", body = BasicUserInfoDto),
        (status = 401, description = "Missing or invalid token", body = ApiError),
    )
)]
async fn get_me(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
) -> Result<Json<BasicUserInfoDto>, ApiError> {
    let user = UsersService::new(resources.db.clone())
        .get_user_by_id(&auth.user_id)
        .await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    put,
    path = "/me",
    tag = USERS_TAG,
    operation_id = "Change Basic Info",
    security(("bearer_auth" = [])),
    request_body = BasicInfoDto,
    responses(
        (status = 200, description = "Updated profile", body = BasicUserInfoDto),
        (status = 401, description = "Missing or invalid token", body = ApiError),
    )
)]
async fn change_basic_info(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<BasicInfoDto>,
) -> Result<Json<BasicUserInfoDto>, ApiError> {
    let user = UsersService::new(resources.db.clone())
        .change_basic_info(&auth.user_id, dto)
        .await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/{id}",
    tag = USERS_TAG,
    operation_id = "Get User",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = BasicUserInfoDto),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    )
)]
async fn get_user(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<Json<BasicUserInfoDto>, ApiError> {
    let user = UsersService::new(resources.db.clone())
        .get_clinic_user(&auth.caller(), &id)
        .await?;
    Ok(Json(user))
}
