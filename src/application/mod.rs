//! Application layer: the store seam and error mapping.

pub mod error;
pub mod repos;
