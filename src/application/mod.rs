//! Application services: article and user workflows over the repository ports.

pub mod articles;
pub mod auth;
pub mod error;
pub mod media;
pub mod repos;
pub mod users;
