pub mod auth;
pub mod factory;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;
pub mod views;
