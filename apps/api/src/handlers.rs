pub mod bind;
pub mod health;
pub mod interactions;
