pub mod driver;
pub mod notification;
pub mod session;
pub mod shipment;
