pub mod location;
pub mod notifications;
pub mod proofs;
pub mod session;
pub mod shipments;
pub mod subscription;
