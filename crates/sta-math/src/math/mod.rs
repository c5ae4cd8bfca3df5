//! Core math modules.

pub mod guard;
pub mod summary;
