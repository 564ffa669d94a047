//! Clinic-management services.
//!
//! Each service wraps the database connection and speaks in DTOs; the HTTP
//! routers in [`crate::api`] are thin shells around them.

pub mod appointments;
pub mod clinics;
pub mod diseases;
pub mod shifts;
pub mod user_cards;
pub mod users;

pub use appointments::AppointmentsService;
pub use clinics::ClinicsService;
pub use diseases::DiseasesService;
pub use shifts::ShiftsService;
pub use user_cards::UserCardsService;
pub use users::UsersService;

use crate::entity::application_user;
use crate::entity::user_role::{self, ROLE_DOCTOR, ROLE_INDIVIDUAL};
use crate::error::ServiceError;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use time::{OffsetDateTime, UtcOffset};

/// The authenticated user a service call is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub clinic_id: Option<String>,
    pub role: String,
}

impl Caller {
    /// Clinic the caller acts within. Users without one can't touch clinic data.
    pub fn clinic_id(&self) -> Result<&str, ServiceError> {
        self.clinic_id
            .as_deref()
            .ok_or_else(|| ServiceError::Forbidden("user is not attached to a clinic".into()))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Instants are stored and compared in UTC; SQLite keeps them as text.
pub(crate) fn to_utc(at: OffsetDateTime) -> OffsetDateTime {
    at.to_offset(UtcOffset::UTC)
}

/// Checks `ends_at > starts_at` and returns the window in UTC.
pub(crate) fn ensure_window(
    starts_at: OffsetDateTime,
    ends_at: OffsetDateTime,
) -> Result<(OffsetDateTime, OffsetDateTime), ServiceError> {
    if ends_at <= starts_at {
        return Err(ServiceError::Validation(
            "ends_at must be after starts_at".into(),
        ));
    }
    Ok((to_utc(starts_at), to_utc(ends_at)))
}

/// `doctor_id` must be a user of the clinic who sees patients.
pub(crate) async fn ensure_clinic_doctor<C: ConnectionTrait>(
    conn: &C,
    clinic_id: &str,
    doctor_id: &str,
) -> Result<(), ServiceError> {
    let member = application_user::Entity::find_by_id(doctor_id)
        .filter(application_user::Column::ClinicId.eq(clinic_id))
        .count(conn)
        .await?
        > 0;
    let practising = member
        && user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(doctor_id))
            .filter(user_role::Column::Role.is_in([ROLE_DOCTOR, ROLE_INDIVIDUAL]))
            .count(conn)
            .await?
            > 0;
    if !practising {
        return Err(ServiceError::Validation(format!(
            "{doctor_id} is not a doctor of this clinic"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn window_must_be_positive() {
        let start = datetime!(2025-03-01 09:00 UTC);
        assert!(ensure_window(start, datetime!(2025-03-01 09:30 UTC)).is_ok());
        assert!(ensure_window(start, start).is_err());
        assert!(ensure_window(start, datetime!(2025-03-01 08:00 UTC)).is_err());
    }

    #[test]
    fn window_is_converted_to_utc() {
        let (starts_at, ends_at) = ensure_window(
            datetime!(2025-03-01 10:30 +01:00),
            datetime!(2025-03-01 11:30 +01:00),
        )
        .unwrap();
        assert_eq!(starts_at.offset(), offset!(UTC));
        assert_eq!(starts_at, datetime!(2025-03-01 09:30 UTC));
        assert_eq!(ends_at.hour(), 10);
    }

    #[test]
    fn caller_without_clinic_is_forbidden() {
        let caller = Caller {
            user_id: "u".into(),
            clinic_id: None,
            role: "Admin".into(),
        };
        assert!(matches!(caller.clinic_id(), Err(ServiceError::Forbidden(_))));
    }
}
