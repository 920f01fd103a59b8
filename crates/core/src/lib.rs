//! Core business logic for shortloop.

pub mod services;

pub use services::*;
