//! Portuguese postal code database builder.
//!
//! Turns the GeoNames postal code dump plus a hand-maintained errata file
//! into a flat `code|place|region|x|y` lookup table, where `x`/`y` are
//! coordinates normalized to the bounding box of the region (mainland,
//! Azores or Madeira) that contains the code.

pub mod builder;
pub mod download;
pub mod emitter;
pub mod error;
pub mod format;
pub mod generalize;
pub mod models;
pub mod reconcile;
pub mod regions;

pub use error::{Error, Result};
