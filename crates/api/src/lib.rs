//! HTTP surface for the analysis service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod render;
pub mod response;
pub mod router;
pub mod state;
