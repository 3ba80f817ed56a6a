pub mod downloads;
pub mod formats;
pub mod health;
pub mod reports;
