//! Doctor shift endpoints.

use crate::AppResources;
use crate::api::auth::{ApiError, OAuth2Auth};
use crate::services::ShiftsService;
use crate::services::shifts::{ShiftDto, ShiftView};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const SHIFTS_TAG: &str = "Shifts";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_shift))
        .routes(routes!(get_shift, update_shift, delete_shift))
        .routes(routes!(list_doctor_shifts))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    post,
    path = "",
    tag = SHIFTS_TAG,
    operation_id = "Create Shift",
    security(("bearer_auth" = [])),
    request_body = ShiftDto,
    responses(
        (status = 201, description = "Shift created", body = ShiftView),
        (status = 400, description = "Invalid window", body = ApiError),
        (status = 409, description = "Overlaps another shift of the doctor", body = ApiError),
    )
)]
async fn create_shift(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<ShiftDto>,
) -> Result<(StatusCode, Json<ShiftView>), ApiError> {
    let shift = ShiftsService::new(resources.db.clone())
        .create_shift(&auth.caller(), dto)
        .await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/{id}",
    tag = SHIFTS_TAG,
    operation_id = "Get Shift",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Shift id")),
    responses(
        (status = 200, description = "Shift found", body = ShiftView),
        (status = 404, description = "Shift not found", body = ApiError),
    )
)]
async fn get_shift(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<Json<ShiftView>, ApiError> {
    let shift = ShiftsService::new(resources.db.clone())
        .get_shift(&auth.caller(), &id)
        .await?;
    Ok(Json(shift))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    put,
    path = "/{id}",
    tag = SHIFTS_TAG,
    operation_id = "Update Shift",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Shift id")),
    request_body = ShiftDto,
    responses(
        (status = 200, description = "Shift updated", body = ShiftView),
        (status = 404, description = "Shift not found", body = ApiError),
        (status = 409, description = "Overlaps another shift of the doctor", body = ApiError),
    )
)]
async fn update_shift(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
    Json(dto): Json<ShiftDto>,
) -> Result<Json<ShiftView>, ApiError> {
    let shift = ShiftsService::new(resources.db.clone())
        .update_shift(&auth.caller(), &id, dto)
        .await?;
    Ok(Json(shift))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = SHIFTS_TAG,
    operation_id = "Delete Shift",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Shift id")),
    responses(
        (status = 204, description = "Shift deleted"),
        (status = 404, description = "Shift not found", body = ApiError),
    )
)]
async fn delete_shift(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ShiftsService::new(resources.db.clone())
        .delete_shift(&auth.caller(), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/doctor/{doctor_id}",
    tag = SHIFTS_TAG,
    operation_id = "List Doctor Shifts",
    security(("bearer_auth" = [])),
    params(("doctor_id" = String, Path, description = "Doctor's user id")),
    responses(
        (status = 200, description = "Shifts ordered by start time", body = Vec<ShiftView>),
    )
)]
async fn list_doctor_shifts(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(doctor_id): Path<String>,
) -> Result<Json<Vec<ShiftView>>, ApiError> {
    let shifts = ShiftsService::new(resources.db.clone())
        .list_for_doctor(&auth.caller(), &doctor_id)
        .await?;
    Ok(Json(shifts))
}
