//! Disease record endpoints.

use crate::AppResources;
use crate::api::auth::{ApiError, OAuth2Auth};
use crate::services::DiseasesService;
use crate::services::diseases::{CreateDiseaseDto, DiseaseDto, UpdateDiseaseDto};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const DISEASES_TAG: &str = "Diseases";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_disease))
        .routes(routes!(get_disease, update_disease, delete_disease))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    post,
    path = "",
    tag = DISEASES_TAG,
    operation_id = "Create Disease",
    security(("bearer_auth" = [])),
    request_body = CreateDiseaseDto,
    responses(
        (status = 201, description = "Disease recorded", body = DiseaseDto),
        (status = 400, description = "Invalid disease data", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError),
    )
)]
async fn create_disease(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<CreateDiseaseDto>,
) -> Result<(StatusCode, Json<DiseaseDto>), ApiError> {
    let disease = DiseasesService::new(resources.db.clone())
        .create_disease(&auth.caller(), dto)
        .await?;
    Ok((StatusCode::CREATED, Json(disease)))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/{id}",
    tag = DISEASES_TAG,
    operation_id = "Get Disease",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Disease id")),
    responses(
        (status = 200, description = "Disease found", body = DiseaseDto),
        (status = 404, description = "Disease not found", body = ApiError),
    )
)]
async fn get_disease(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<Json<DiseaseDto>, ApiError> {
    let disease = DiseasesService::new(resources.db.clone())
        .get_disease(&auth.caller(), &id)
        .await?;
    Ok(Json(disease))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    put,
    path = "/{id}",
    tag = DISEASES_TAG,
    operation_id = "Update Disease",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Disease id")),
    request_body = UpdateDiseaseDto,
    responses(
        (status = 200, description = "Disease updated", body = DiseaseDto),
        (status = 404, description = "Disease not found", body = ApiError),
    )
)]
async fn update_disease(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
    Json(dto): Json<UpdateDiseaseDto>,
) -> Result<Json<DiseaseDto>, ApiError> {
    let disease = DiseasesService::new(resources.db.clone())
        .update_disease(&auth.caller(), &id, dto)
        .await?;
    Ok(Json(disease))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = DISEASES_TAG,
    operation_id = "Delete Disease",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Disease id")),
    responses(
        (status = 204, description = "Disease deleted"),
        (status = 404, description = "Disease not found", body = ApiError),
    )
)]
async fn delete_disease(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    DiseasesService::new(resources.db.clone())
        .delete_disease(&auth.caller(), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
