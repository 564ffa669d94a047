//! OpenAPI/Utoipa configuration.

use crate::api::{
    appointments::APPOINTMENTS_TAG, clinics::CLINICS_TAG, diseases::DISEASES_TAG,
    health::MISC_TAG, shifts::SHIFTS_TAG, user_cards::USER_CARDS_TAG, users::USERS_TAG,
};
use crate::oauth2::OAUTH2_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{Flow, HttpAuthScheme, HttpBuilder, OAuth2, Password, Scopes, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let bearer = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .description(Some(
                "Opaque access token obtained from `POST /oauth2/token`.",
            ))
            .build();
        components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

        let oauth2 = OAuth2::new([Flow::Password(Password::with_refresh_url(
            "/oauth2/token",
            Scopes::from_iter([
                ("openid", "OpenID Connect scope"),
                ("profile", "Access to the user's profile"),
                ("offline_access", "Issue a refresh token"),
            ]),
            "/oauth2/token",
        ))]);
        components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Hebi API",
        version = "1.0.0",
        description = "Clinic management API with an OAuth2 token endpoint."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 token issuance"),
        (name = USERS_TAG, description = "User accounts and patients"),
        (name = CLINICS_TAG, description = "Clinics"),
        (name = USER_CARDS_TAG, description = "Patient cards"),
        (name = DISEASES_TAG, description = "Disease records"),
        (name = APPOINTMENTS_TAG, description = "Appointments"),
        (name = SHIFTS_TAG, description = "Doctor shifts")
    )
)]
pub struct ApiDoc;
