use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::driver::{DriverProfile, DriverStatus, GeoPoint};
use crate::models::session::Session;

const FALLBACK_NAME: &str = "Driver";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub status: DriverStatus,
    pub vehicle: Option<String>,
    pub vehicle_label: String,
    pub location: Option<GeoPoint>,
    pub last_location_update: Option<DateTime<Utc>>,
}

impl ProfileView {
    /// The stored profile wins over the session's display name.
    pub fn build(session: &Session, profile: Option<&DriverProfile>) -> Self {
        let name = profile
            .map(|profile| profile.name.trim())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                session
                    .display_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or(FALLBACK_NAME)
            .to_string();

        let vehicle = profile.and_then(|profile| profile.vehicle.clone());
        let vehicle_label = match &vehicle {
            Some(vehicle) => format!("Vehicle: {vehicle}"),
            None => "Not configured".to_string(),
        };

        Self {
            name,
            email: profile
                .map(|profile| profile.email.clone())
                .unwrap_or_else(|| session.email.clone()),
            status: profile.map(|profile| profile.status).unwrap_or_default(),
            vehicle,
            vehicle_label,
            location: profile.and_then(|profile| profile.location.clone()),
            last_location_update: profile.and_then(|profile| profile.last_location_update),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProfileView;
    use crate::models::driver::{DriverProfile, DriverStatus};
    use crate::models::session::Session;

    fn session(display_name: Option<&str>) -> Session {
        Session {
            uid: "d1".to_string(),
            display_name: display_name.map(str::to_string),
            email: "dee@example.com".to_string(),
        }
    }

    #[test]
    fn falls_back_to_generic_name() {
        let view = ProfileView::build(&session(None), None);
        assert_eq!(view.name, "Driver");
        assert_eq!(view.status, DriverStatus::Available);
        assert_eq!(view.vehicle_label, "Not configured");
    }

    #[test]
    fn stored_profile_takes_precedence() {
        let mut profile = DriverProfile::new("d1", "Dee Stored", "dee@example.com");
        profile.vehicle = Some("Van 12".to_string());
        profile.status = DriverStatus::Busy;

        let view = ProfileView::build(&session(Some("Dee Session")), Some(&profile));
        assert_eq!(view.name, "Dee Stored");
        assert_eq!(view.vehicle_label, "Vehicle: Van 12");
        assert_eq!(view.status, DriverStatus::Busy);
    }
}
