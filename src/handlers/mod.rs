//! HTTP handlers for the index, reset and entity CRUD endpoints.

pub mod common;
pub mod entity;

pub use common::*;
pub use entity::*;
