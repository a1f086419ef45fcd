pub mod identity;
pub mod issuance;
pub mod registration;
pub mod tickets;
