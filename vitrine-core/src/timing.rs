//! Panel scan timing
//!
//! The timing generator free-runs once started: every line is
//! `hsync pulse + back porch + active + front porch` pixel clocks, every
//! frame is the analogous number of lines. These values come from the
//! panel profile and must stay consistent with the line count programmed
//! into the controller over the command interface - a mismatch shifts or
//! tears the image instead of producing an error.

/// Continuous scan-out timing parameters
///
/// All fields are per-hardware-revision constants carried by
/// [`crate::config::PanelProfile`]; nothing here is derived at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanTimings {
    /// Pixel clock frequency in Hz
    pub pclk_hz: u32,
    /// Active horizontal resolution in pixels
    pub h_res: u16,
    /// Active vertical resolution in lines
    pub v_res: u16,
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
}

impl ScanTimings {
    /// Total pixel clocks per line, blanking included
    pub fn total_columns(&self) -> u32 {
        self.h_res as u32
            + self.hsync_pulse as u32
            + self.hsync_back_porch as u32
            + self.hsync_front_porch as u32
    }

    /// Total lines per frame, blanking included
    pub fn total_lines(&self) -> u32 {
        self.v_res as u32
            + self.vsync_pulse as u32
            + self.vsync_back_porch as u32
            + self.vsync_front_porch as u32
    }

    /// Duration of one scan line in nanoseconds
    pub fn line_period_ns(&self) -> u64 {
        self.total_columns() as u64 * 1_000_000_000 / self.pclk_hz as u64
    }

    /// Duration of one full frame in microseconds
    pub fn frame_period_us(&self) -> u64 {
        self.line_period_ns() * self.total_lines() as u64 / 1_000
    }

    /// Nominal refresh rate in millihertz
    pub fn refresh_rate_mhz(&self) -> u32 {
        let frame_clocks = self.total_columns() as u64 * self.total_lines() as u64;
        (self.pclk_hz as u64 * 1_000 / frame_clocks) as u32
    }

    /// Time budget for refilling `lines` scan lines of staging, in
    /// microseconds. The streaming engine drains one line per
    /// [`line_period_ns`](Self::line_period_ns); a refill that takes
    /// longer than this produces a corrupted band for the frame.
    pub fn refill_budget_us(&self, lines: u16) -> u64 {
        self.line_period_ns() * lines as u64 / 1_000
    }
}

/// Allowed pixel clock deviation in parts per thousand.
///
/// The clock tree divides an integer source clock, so the achieved rate
/// rarely matches the request exactly; anything inside this window keeps
/// the panel within its refresh tolerance.
pub const PCLK_TOLERANCE_PERMILLE: u32 = 50;

/// Closest pixel clock an integer divider from `root_hz` can achieve.
pub fn achievable_pclk(root_hz: u32, requested_hz: u32) -> u32 {
    if requested_hz == 0 || root_hz == 0 {
        return 0;
    }
    // Round the divider to the nearest integer, minimum 1.
    let divider = ((root_hz as u64 + requested_hz as u64 / 2) / requested_hz as u64).max(1);
    (root_hz as u64 / divider) as u32
}

/// Check that an achieved pixel clock is within tolerance of the request.
pub fn pclk_within_tolerance(requested_hz: u32, achieved_hz: u32) -> bool {
    if requested_hz == 0 {
        return false;
    }
    let delta = requested_hz.abs_diff(achieved_hz) as u64;
    delta * 1_000 <= requested_hz as u64 * PCLK_TOLERANCE_PERMILLE as u64
}
