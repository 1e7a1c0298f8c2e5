//! View models and the dashboard controller that drives them.

pub mod board;
pub mod dashboard;
pub mod map;
pub mod profile;
pub mod toast;

pub use dashboard::{Dashboard, DashboardEvent, DashboardSnapshot};
