//! Foundation utilities shared by every pipeline stage

pub mod logging;
pub mod math;
