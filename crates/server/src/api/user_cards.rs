//! Patient card endpoints, scoped to the caller's clinic.

use crate::AppResources;
use crate::api::auth::{ApiError, OAuth2Auth};
use crate::services::diseases::DiseaseDto;
use crate::services::user_cards::{CreateUserCardDto, UpdateUserCardDto, UserCardDto};
use crate::services::{DiseasesService, UserCardsService};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const USER_CARDS_TAG: &str = "User cards";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_user_card))
        .routes(routes!(get_user_card, update_user_card, delete_user_card))
        .routes(routes!(list_card_diseases))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    post,
    path = "",
    tag = USER_CARDS_TAG,
    operation_id = "Create User Card",
    security(("bearer_auth" = [])),
    request_body = CreateUserCardDto,
    responses(
        (status = 201, description = "Card created", body = UserCardDto),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Caller has no clinic", body = ApiError),
    )
)]
async fn create_user_card(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Json(dto): Json<CreateUserCardDto>,
) -> Result<(StatusCode, Json<UserCardDto>), ApiError> {
    let card = UserCardsService::new(resources.db.clone())
        .create_user_card(&auth.caller(), &dto.user_id, dto.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/{id}",
    tag = USER_CARDS_TAG,
    operation_id = "Get User Card",
    summary = "Card with its disease records",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Card id")),
    responses(
        (status = 200, description = "Card found", body = UserCardDto),
        (status = 404, description = "Card not found", body = ApiError),
    )
)]
async fn get_user_card(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<Json<UserCardDto>, ApiError> {
    let card = UserCardsService::new(resources.db.clone())
        .get_user_card(&auth.caller(), &id)
        .await?;
    Ok(Json(card))
}

#[tracing::instrument(skip(resources, auth, dto), fields(caller = %auth.user_id))]
#[utoipa::path(
    put,
    path = "/{id}",
    tag = USER_CARDS_TAG,
    operation_id = "Update User Card",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Card id")),
    request_body = UpdateUserCardDto,
    responses(
        (status = 200, description = "Card updated", body = UserCardDto),
        (status = 404, description = "Card not found", body = ApiError),
    )
)]
async fn update_user_card(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
    Json(dto): Json<UpdateUserCardDto>,
) -> Result<Json<UserCardDto>, ApiError> {
    let card = UserCardsService::new(resources.db.clone())
        .update_user_card(&auth.caller(), &id, dto)
        .await?;
    Ok(Json(card))
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = USER_CARDS_TAG,
    operation_id = "Delete User Card",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Card id")),
    responses(
        (status = 204, description = "Card deleted"),
        (status = 404, description = "Card not found", body = ApiError),
    )
)]
async fn delete_user_card(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    UserCardsService::new(resources.db.clone())
        .delete_user_card(&auth.caller(), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(resources, auth), fields(caller = %auth.user_id))]
#[utoipa::path(
    get,
    path = "/{id}/diseases",
    tag = USER_CARDS_TAG,
    operation_id = "List Card Diseases",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Card id")),
    responses(
        (status = 200, description = "Disease records of the card", body = Vec<DiseaseDto>),
        (status = 404, description = "Card not found", body = ApiError),
    )
)]
async fn list_card_diseases(
    Extension(resources): Extension<AppResources>,
    OAuth2Auth(auth): OAuth2Auth,
    Path(id): Path<String>,
) -> Result<Json<Vec<DiseaseDto>>, ApiError> {
    let diseases = DiseasesService::new(resources.db.clone())
        .list_for_card(&auth.caller(), &id)
        .await?;
    Ok(Json(diseases))
}
