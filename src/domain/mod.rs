//! Domain layer types and invariants.

pub mod cover;
pub mod entities;
pub mod error;
