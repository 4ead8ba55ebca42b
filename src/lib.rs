//! Chronicle: a blog API with a time-windowed cache of recent articles.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
