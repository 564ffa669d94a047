//! SeaORM entity models.

pub mod appointment;
pub mod application_user;
pub mod clinic;
pub mod disease;
pub mod oauth2_client;
pub mod oauth2_token;
pub mod shift;
pub mod user_card;
pub mod user_role;
