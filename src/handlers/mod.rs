//! HTTP handlers for synthesized entity routes.

pub mod entity;
pub use entity::*;
