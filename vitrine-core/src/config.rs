//! Panel profile configuration
//!
//! A [`PanelProfile`] is the complete per-hardware-revision description of
//! one physical panel assembly: scan timing, staging depth, bus speeds and
//! the command-interface settle delay. The numbers are hardware-verified
//! constants for a given board revision, not tunables - incorrect timing
//! values desynchronize the scan rather than failing loudly.

use crate::error::DisplayError;
use crate::timing::ScanTimings;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bytes per pixel for the fixed RGB565 format
pub const BYTES_PER_PIXEL: usize = 2;

/// Per-revision panel description
///
/// The default profile describes the 480x480 RGB565 round-corner panel
/// revision this firmware ships on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PanelProfile {
    /// Active horizontal resolution in pixels
    pub h_res: u16,
    /// Active vertical resolution in lines
    pub v_res: u16,
    /// Pixel clock in Hz
    pub pclk_hz: u32,
    /// Horizontal sync pulse width in pixel clocks
    pub hsync_pulse: u16,
    /// Horizontal back porch in pixel clocks
    pub hsync_back_porch: u16,
    /// Horizontal front porch in pixel clocks
    pub hsync_front_porch: u16,
    /// Vertical sync pulse width in lines
    pub vsync_pulse: u16,
    /// Vertical back porch in lines
    pub vsync_back_porch: u16,
    /// Vertical front porch in lines
    pub vsync_front_porch: u16,
    /// Latch pixel data on the falling pclk edge
    pub pclk_active_falling: bool,
    /// Scan lines per staging slot for the streaming engine.
    ///
    /// Two slots of this many lines sit in internal SRAM; the transfer
    /// engine drains one while the CPU refills the other. Larger values
    /// trade SRAM for slack against refill latency. 0 disables staging
    /// entirely and streams straight from bulk memory.
    pub bounce_lines: u16,
    /// Alignment the transfer engine requires of the scan buffers
    pub buffer_align: usize,
    /// Command-interface settle time around each clock edge, in
    /// nanoseconds. Conservative by default; boards with short traces
    /// can lower it, but the default is the value validated on the
    /// reference hardware.
    pub spi_edge_delay_ns: u32,
    /// Touch controller I2C clock in Hz
    pub touch_i2c_hz: u32,
    /// Touch polling interval in milliseconds
    pub touch_poll_ms: u32,
}

impl Default for PanelProfile {
    fn default() -> Self {
        Self {
            h_res: 480,
            v_res: 480,
            pclk_hz: 40_000_000,
            hsync_pulse: 8,
            hsync_back_porch: 50,
            hsync_front_porch: 10,
            vsync_pulse: 8,
            vsync_back_porch: 20,
            vsync_front_porch: 10,
            pclk_active_falling: true,
            bounce_lines: 10,
            buffer_align: 64,
            spi_edge_delay_ns: 1_000,
            touch_i2c_hz: 400_000,
            touch_poll_ms: 20,
        }
    }
}

impl PanelProfile {
    /// Scan timing parameters for the timing generator
    pub fn scan_timings(&self) -> ScanTimings {
        ScanTimings {
            pclk_hz: self.pclk_hz,
            h_res: self.h_res,
            v_res: self.v_res,
            hsync_pulse: self.hsync_pulse,
            hsync_back_porch: self.hsync_back_porch,
            hsync_front_porch: self.hsync_front_porch,
            vsync_pulse: self.vsync_pulse,
            vsync_back_porch: self.vsync_back_porch,
            vsync_front_porch: self.vsync_front_porch,
            pclk_active_falling: self.pclk_active_falling,
        }
    }

    /// Pixels per frame
    pub fn frame_pixels(&self) -> usize {
        self.h_res as usize * self.v_res as usize
    }

    /// Bytes per frame buffer
    pub fn frame_bytes(&self) -> usize {
        self.frame_pixels() * BYTES_PER_PIXEL
    }

    /// Bytes per scan line
    pub fn line_bytes(&self) -> usize {
        self.h_res as usize * BYTES_PER_PIXEL
    }

    /// Cross-check the profile against the line count programmed into the
    /// panel controller's registers.
    ///
    /// The controller register sequence and the timing generator are one
    /// logical configuration: if they disagree the panel shows a shifted
    /// or torn image with no error anywhere, so the mismatch is rejected
    /// here before any hardware is touched.
    pub fn validate(&self, controller_lines: u16) -> Result<(), DisplayError> {
        if self.h_res == 0 || self.v_res == 0 || self.pclk_hz == 0 {
            return Err(DisplayError::ConfigRejected);
        }
        if self.v_res != controller_lines {
            return Err(DisplayError::ConfigRejected);
        }
        if self.bounce_lines as u32 > self.v_res as u32 {
            return Err(DisplayError::ConfigRejected);
        }
        if !self.buffer_align.is_power_of_two() {
            return Err(DisplayError::ConfigRejected);
        }
        Ok(())
    }
}
