use serde::Serialize;

use crate::models::shipment::{DeliveryProof, Shipment, ShipmentStatus};

pub const NO_SHIPMENTS: &str = "No shipments assigned to you.";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardTab {
    Active,
    Pending,
    Completed,
}

impl BoardTab {
    pub const ALL: [BoardTab; 3] = [BoardTab::Active, BoardTab::Pending, BoardTab::Completed];

    pub fn status(&self) -> ShipmentStatus {
        match self {
            BoardTab::Active => ShipmentStatus::InTransit,
            BoardTab::Pending => ShipmentStatus::Pending,
            BoardTab::Completed => ShipmentStatus::Delivered,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            BoardTab::Active => "Active",
            BoardTab::Pending => "Pending",
            BoardTab::Completed => "Completed",
        }
    }

    fn empty_message(&self) -> &'static str {
        match self {
            BoardTab::Active => "No active shipments.",
            BoardTab::Pending => "No pending shipments.",
            BoardTab::Completed => "No completed shipments.",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardAction {
    StartDelivery,
    UploadProof,
    MarkDelivered,
}

impl CardAction {
    pub fn for_status(status: ShipmentStatus) -> Vec<CardAction> {
        match status {
            ShipmentStatus::Pending => vec![CardAction::StartDelivery],
            ShipmentStatus::InTransit => vec![CardAction::UploadProof, CardAction::MarkDelivered],
            ShipmentStatus::Delivered => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Yellow,
    Blue,
    Green,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShipmentCard {
    pub id: String,
    pub title: String,
    pub customer: String,
    pub address: String,
    pub status: ShipmentStatus,
    pub status_label: String,
    pub badge: BadgeTone,
    pub actions: Vec<CardAction>,
    pub uploading: bool,
    pub proofs: Vec<DeliveryProof>,
}

impl ShipmentCard {
    pub fn new(shipment: &Shipment, uploading: bool) -> Self {
        let badge = match shipment.status {
            ShipmentStatus::Pending => BadgeTone::Yellow,
            ShipmentStatus::InTransit => BadgeTone::Blue,
            ShipmentStatus::Delivered => BadgeTone::Green,
        };

        Self {
            id: shipment.id.clone(),
            title: format!("Shipment #{}", shipment.id),
            customer: shipment.customer.clone(),
            address: shipment.display_address().to_string(),
            status: shipment.status,
            status_label: shipment.status.as_str().replace('_', " "),
            badge,
            actions: CardAction::for_status(shipment.status),
            uploading,
            proofs: shipment.delivery_proofs.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TabView {
    pub tab: BoardTab,
    pub label: String,
    pub count: usize,
    pub cards: Vec<ShipmentCard>,
    pub empty_message: Option<&'static str>,
}

/// Shipment list grouped into the dashboard's three tabs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShipmentBoard {
    pub default_tab: BoardTab,
    pub tabs: Vec<TabView>,
    pub total: usize,
    pub empty_message: Option<&'static str>,
}

impl ShipmentBoard {
    pub fn group(shipments: &[Shipment], uploading: &[String]) -> Self {
        let tabs = BoardTab::ALL
            .iter()
            .map(|tab| {
                let cards: Vec<ShipmentCard> = shipments
                    .iter()
                    .filter(|shipment| shipment.status == tab.status())
                    .map(|shipment| ShipmentCard::new(shipment, uploading.contains(&shipment.id)))
                    .collect();
                let count = cards.len();

                TabView {
                    tab: *tab,
                    label: format!("{} ({count})", tab.title()),
                    count,
                    empty_message: cards.is_empty().then(|| tab.empty_message()),
                    cards,
                }
            })
            .collect();

        Self {
            default_tab: BoardTab::Active,
            tabs,
            total: shipments.len(),
            empty_message: shipments.is_empty().then_some(NO_SHIPMENTS),
        }
    }

    pub fn tab(&self, tab: BoardTab) -> Option<&TabView> {
        self.tabs.iter().find(|view| view.tab == tab)
    }
}
