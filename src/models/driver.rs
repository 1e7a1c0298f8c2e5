use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    #[default]
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: DriverStatus,
    pub vehicle: Option<String>,
    pub location: Option<GeoPoint>,
    pub last_location_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub push_tokens: BTreeSet<String>,
    pub token_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            status: DriverStatus::Available,
            vehicle: None,
            location: None,
            last_location_update: None,
            push_tokens: BTreeSet::new(),
            token_updated_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DriverPatch {
    pub name: Option<String>,
    pub status: Option<DriverStatus>,
    pub vehicle: Option<String>,
}

impl DriverPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none() && self.vehicle.is_none()
    }
}
