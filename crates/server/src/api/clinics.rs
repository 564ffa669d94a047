//! Clinic endpoints. A clinic owner creates one clinic and manages it.

use crate::AppResources;
use crate::api::auth::{ApiError, AuthenticatedUser, OAuth2Auth};
use crate::entity::user_role::ROLE_ADMIN;
use crate::services::clinics::{ClinicDto, CreateClinicDto};
use crate::services::{ClinicsService, UsersService};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const CLINICS_TAG: &str = "Clinics";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_clinic))
        .routes(routes!(get_clinic, update_clinic, delete_clinic))
}

fn ensure_own_clinic(auth: &AuthenticatedUser, clinic_id: &str) -> Result<(), ApiError> {
    if auth.clinic_id.as_deref() == Some(clinic_id) {
        Ok(())
    } else {
        Err(ApiError::not_found("clinic not found"))
    }
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    post,
    path = "",
    tag = CLINICS_TAG,
    operation_id = "Create Clinic",
    summary = "Create the caller's clinic",
    description = "The calling Admin becomes a member of the new clinic. \
                   Sign in again to receive a token carrying the clinic.",
    security(("bearer_auth" = [])),
    request_body = CreateClinicDto,
    responses(
        (status = 201, description = "Clinic created", body = ClinicDto),
        (status = 400, description = "Invalid clinic data", body = ApiError),
        (status = 403, description = "Caller is not an Admin", body = ApiError),
        (status = 409, description = "Caller already has a clinic", body = ApiError),
    )
)]
async fn create_clinic(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<CreateClinicDto>,
) -> Result<(StatusCode, Json<ClinicDto>), ApiError> {
    auth.require_role(ROLE_ADMIN)?;
    if auth.clinic_id.is_some() {
        return Err(ApiError::conflict("You already belong to a clinic"));
    }
    let clinic = ClinicsService::new(resources.db.clone())
        .create_clinic(dto)
        .await?;
    UsersService::new(resources.db.clone())
        .assign_clinic(&auth.user_id, &clinic.id)
        .await?;
    Ok((StatusCode::CREATED, Json(clinic)))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/{id}",
    tag = CLINICS_TAG,
    operation_id = "Get Clinic",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Clinic id")),
    responses(
        (status = 200, description = "Clinic found", body = ClinicDto),
        (status = 404, description = "Clinic not found", body = ApiError),
    )
)]
async fn get_clinic(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<Json<ClinicDto>, ApiError> {
    ensure_own_clinic(&auth, &id)?;
    let clinic = ClinicsService::new(resources.db.clone())
        .get_clinic(&id)
        .await?;
    Ok(Json(clinic))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    put,
    path = "/{id}",
    tag = CLINICS_TAG,
    operation_id = "Update Clinic",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Clinic id")),
    request_body = CreateClinicDto,
    responses(
        (status = 200, description = "Clinic updated", body = ClinicDto),
        (status = 403, description = "Caller is not an Admin", body = ApiError),
        (status = 404, description = "Clinic not found", body = ApiError),
    )
)]
async fn update_clinic(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
    Json(dto): Json<CreateClinicDto>,
) -> Result<Json<ClinicDto>, ApiError> {
    auth.require_role(ROLE_ADMIN)?;
    ensure_own_clinic(&auth, &id)?;
    let clinic = ClinicsService::new(resources.db.clone())
        .update_clinic(&id, dto)
        .await?;
    Ok(Json(clinic))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = CLINICS_TAG,
    operation_id = "Delete Clinic",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Clinic id")),
    responses(
        (status = 204, description = "Clinic deleted"),
        (status = 403, description = "Caller is not an Admin", body = ApiError),
        (status = 404, description = "Clinic not found", body = ApiError),
    )
)]
async fn delete_clinic(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(ROLE_ADMIN)?;
    ensure_own_clinic(&auth, &id)?;
    ClinicsService::new(resources.db.clone())
        .delete_clinic(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
