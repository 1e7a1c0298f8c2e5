use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Delivered => "delivered",
        }
    }

    /// Status a shipment may move to next. Delivered is terminal.
    pub fn next(&self) -> Option<ShipmentStatus> {
        match self {
            ShipmentStatus::Pending => Some(ShipmentStatus::InTransit),
            ShipmentStatus::InTransit => Some(ShipmentStatus::Delivered),
            ShipmentStatus::Delivered => None,
        }
    }

    pub fn can_transition_to(&self, target: ShipmentStatus) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(ShipmentStatus::Pending),
            "in_transit" => Ok(ShipmentStatus::InTransit),
            "delivered" => Ok(ShipmentStatus::Delivered),
            other => Err(format!(
                "unknown status: {other}, expected pending/in_transit/delivered"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub address: String,
    pub coordinates: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryProof {
    pub url: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: String,
    pub driver_id: String,
    pub status: ShipmentStatus,
    pub customer: String,
    pub destination: Option<Destination>,
    /// Flat address carried by older records that predate `destination`.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub delivery_proofs: Vec<DeliveryProof>,
    #[serde(default)]
    pub status_history: BTreeMap<ShipmentStatus, DateTime<Utc>>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub fn display_address(&self) -> &str {
        self.destination
            .as_ref()
            .map(|destination| destination.address.as_str())
            .or(self.address.as_deref())
            .unwrap_or("")
    }

    pub fn destination_coordinates(&self) -> Option<&GeoPoint> {
        self.destination
            .as_ref()
            .and_then(|destination| destination.coordinates.as_ref())
    }

    /// Status whose history entry was written last, if any history exists.
    pub fn latest_history_status(&self) -> Option<ShipmentStatus> {
        self.status_history
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(status, _)| *status)
    }
}

#[cfg(test)]
mod tests {
    use super::ShipmentStatus;

    #[test]
    fn only_forward_single_step_transitions_are_legal() {
        assert!(ShipmentStatus::Pending.can_transition_to(ShipmentStatus::InTransit));
        assert!(ShipmentStatus::InTransit.can_transition_to(ShipmentStatus::Delivered));

        assert!(!ShipmentStatus::Pending.can_transition_to(ShipmentStatus::Delivered));
        assert!(!ShipmentStatus::Pending.can_transition_to(ShipmentStatus::Pending));
        assert!(!ShipmentStatus::Delivered.can_transition_to(ShipmentStatus::InTransit));
        assert!(!ShipmentStatus::InTransit.can_transition_to(ShipmentStatus::Pending));
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!(
            "in_transit".parse::<ShipmentStatus>(),
            Ok(ShipmentStatus::InTransit)
        );
        assert!("lost".parse::<ShipmentStatus>().is_err());
    }

    #[test]
    fn status_map_keys_serialize_as_wire_names() {
        let mut history = std::collections::BTreeMap::new();
        history.insert(ShipmentStatus::InTransit, chrono::Utc::now());
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.get("in_transit").is_some());
    }
}
