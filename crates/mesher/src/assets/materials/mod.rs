//! Material decoding and sharing
//!
//! JSON descriptor parsing plus the store that hands out one shared
//! material per material id.

pub mod material_parser;
pub mod material_store;

pub use material_parser::{MaterialError, MaterialParser};
pub use material_store::{MaterialStore, Reservation};
