//! Error taxonomy for the display and touch pipelines
//!
//! Initialization failures abort startup; runtime failures are absorbed
//! where they occur and self-correct on the next cycle (see the bounce
//! engine's underrun accounting and the touch driver's best-effort poll).

/// Errors that can occur while bringing up the display pipeline
///
/// All variants are fatal: there is no partial or degraded display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// The timing generator cannot be programmed to the requested pixel
    /// clock within tolerance, or the panel profile is inconsistent with
    /// the controller's programmed register values.
    ConfigRejected,
    /// The two scan buffers could not be reserved contiguously with the
    /// alignment the transfer engine requires.
    BufferAllocationFailed,
}

/// Errors that can occur during touch controller discovery
///
/// Fatal to touch initialization only; the display pipeline continues
/// without touch input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchInitError {
    /// No device acknowledged either the primary or the fallback address.
    DeviceNotFound,
}
