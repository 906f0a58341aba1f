//! Database models split into domain-specific modules.

pub mod common;
pub mod image;
pub mod user;

pub use common::*;
pub use image::*;
pub use user::*;
