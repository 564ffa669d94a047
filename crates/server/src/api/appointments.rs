//! Appointment endpoints.
//!
//! - `GET /` - Paged list, filterable by doctor and time window
//! - `POST /` - Book an appointment
//! - `GET|PUT|DELETE /{id}`

use crate::AppResources;
use crate::api::auth::{ApiError, OAuth2Auth};
use crate::services::AppointmentsService;
use crate::services::appointments::{
    AppointmentDto, AppointmentPage, AppointmentQuery, AppointmentView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const APPOINTMENTS_TAG: &str = "Appointments";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_appointments, create_appointment))
        .routes(routes!(
            get_appointment,
            update_appointment,
            delete_appointment
        ))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "",
    tag = APPOINTMENTS_TAG,
    operation_id = "List Appointments",
    summary = "Appointments of the caller's clinic ordered by start time",
    security(("bearer_auth" = [])),
    params(AppointmentQuery),
    responses(
        (status = 200, description = "One page of appointments", body = AppointmentPage),
        (status = 400, description = "Invalid window", body = ApiError),
    )
)]
async fn list_appointments(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<AppointmentPage>, ApiError> {
    let page = AppointmentsService::new(resources.db.clone())
        .list_appointments(&auth.caller(), query)
        .await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    post,
    path = "",
    tag = APPOINTMENTS_TAG,
    operation_id = "Create Appointment",
    security(("bearer_auth" = [])),
    request_body = AppointmentDto,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentView),
        (status = 400, description = "Invalid window", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError),
    )
)]
async fn create_appointment(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<AppointmentDto>,
) -> Result<(StatusCode, Json<AppointmentView>), ApiError> {
    let appointment = AppointmentsService::new(resources.db.clone())
        .create_appointment(&auth.caller(), dto)
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/{id}",
    tag = APPOINTMENTS_TAG,
    operation_id = "Get Appointment",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment found", body = AppointmentView),
        (status = 404, description = "Appointment not found", body = ApiError),
    )
)]
async fn get_appointment(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<Json<AppointmentView>, ApiError> {
    let appointment = AppointmentsService::new(resources.db.clone())
        .get_appointment(&auth.caller(), &id)
        .await?;
    Ok(Json(appointment))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    put,
    path = "/{id}",
    tag = APPOINTMENTS_TAG,
    operation_id = "Update Appointment",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Appointment id")),
    request_body = AppointmentDto,
    responses(
        (status = 200, description = "Appointment updated", body = AppointmentView),
        (status = 400, description = "Invalid window", body = ApiError),
        (status = 404, description = "Appointment not found", body = ApiError),
    )
)]
async fn update_appointment(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
    Json(dto): Json<AppointmentDto>,
) -> Result<Json<AppointmentView>, ApiError> {
    let appointment = AppointmentsService::new(resources.db.clone())
        .update_appointment(&auth.caller(), &id, dto)
        .await?;
    Ok(Json(appointment))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = APPOINTMENTS_TAG,
    operation_id = "Delete Appointment",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Appointment id")),
    responses(
        (status = 204, description = "Appointment cancelled"),
        (status = 404, description = "Appointment not found", body = ApiError),
    )
)]
async fn delete_appointment(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    AppointmentsService::new(resources.db.clone())
        .delete_appointment(&auth.caller(), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
