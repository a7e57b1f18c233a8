//! Panel controller drivers

pub mod st7701;

pub use st7701::{FrameKind, St7701, ThreeWireBus, ThreeWireConfig};
