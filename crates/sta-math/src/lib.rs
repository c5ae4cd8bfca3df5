//! Spatio-temporal analysis math utilities.

pub mod math;

pub use math::guard::*;
pub use math::summary::*;
