pub mod access;
pub mod auth;
pub mod donation;
pub mod geocode;
pub mod notification;
pub mod stats;
