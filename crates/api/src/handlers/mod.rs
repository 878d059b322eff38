pub mod analyses;
pub mod documents;
pub mod health;
pub mod reports;
