// Ledger services
pub mod consumption;
pub mod expiration;
pub mod inventory;
pub mod tasks;

// Read models
pub mod search;
pub mod statistics;

// Operation log shared by every mutation
pub mod audit;
