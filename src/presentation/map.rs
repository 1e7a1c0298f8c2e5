use serde::Serialize;

use crate::geo::haversine_km;
use crate::models::driver::GeoPoint;
use crate::models::shipment::Shipment;

const NAVIGATION_BASE: &str = "https://www.google.com/maps/dir/?api=1";
const DEFAULT_ZOOM: u8 = 8;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveDelivery {
    pub shipment_id: String,
    pub customer: String,
    pub address: String,
    pub coordinates: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapView {
    pub loading: bool,
    pub tracking: bool,
    pub center: GeoPoint,
    pub zoom: u8,
    pub current_location: Option<GeoPoint>,
    pub location_label: String,
    pub description: String,
    pub active: Option<ActiveDelivery>,
    pub distance_km: Option<f64>,
    pub navigation_url: Option<String>,
}

impl MapView {
    pub fn build(
        current_location: Option<GeoPoint>,
        active: Option<&Shipment>,
        tracking: bool,
        loading: bool,
    ) -> Self {
        let active = active.map(|shipment| ActiveDelivery {
            shipment_id: shipment.id.clone(),
            customer: shipment.customer.clone(),
            address: shipment.display_address().to_string(),
            coordinates: shipment.destination_coordinates().cloned(),
        });

        let description = match &active {
            Some(delivery) => format!("Navigate to: {}", delivery.address),
            None => "Your current location and delivery routes".to_string(),
        };

        let target = active.as_ref().and_then(|delivery| delivery.coordinates.as_ref());
        let distance_km = match (&current_location, target) {
            (Some(here), Some(there)) => Some(haversine_km(here, there)),
            _ => None,
        };

        Self {
            loading,
            tracking,
            center: current_location.clone().unwrap_or(GeoPoint {
                latitude: 0.0,
                longitude: 0.0,
            }),
            zoom: DEFAULT_ZOOM,
            location_label: location_label(current_location.as_ref()),
            current_location,
            description,
            navigation_url: target.map(navigation_url),
            distance_km,
            active,
        }
    }
}

pub fn navigation_url(destination: &GeoPoint) -> String {
    format!(
        "{NAVIGATION_BASE}&destination={},{}",
        destination.latitude, destination.longitude
    )
}

pub fn location_label(location: Option<&GeoPoint>) -> String {
    match location {
        Some(point) => format!(
            "Current location: {:.6}, {:.6}",
            point.latitude, point.longitude
        ),
        None => "Location not available".to_string(),
    }
}
