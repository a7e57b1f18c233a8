//! RGB scan-out over the LCD_CAM DPI peripheral
//!
//! The DPI engine mandates DMA and cannot sustain PSRAM bandwidth under
//! contention, so the default path stages pixel data through a small
//! internal-SRAM loop buffer: the DMA circles it continuously while the
//! scan task copies frame lines in behind the drain point (two slots,
//! refill one while the other drains). With staging disabled the DMA
//! reads whole frames straight from the PSRAM scan buffer instead,
//! saving the SRAM but losing all slack against contention.
//!
//! Refill overruns and DMA errors here are soft: one corrupted or dark
//! band for that frame, clean again on the next.

use esp_hal::dma::{DmaDescriptor, DmaError, DmaLoopBuf, DmaTxBuf, ExternalBurstConfig};
use esp_hal::gpio::Level;
use esp_hal::lcd_cam::lcd::dpi::{Config as DpiConfig, Dpi, DpiTransfer, Format, FrameTiming};
use esp_hal::lcd_cam::lcd::{ClockMode, Phase, Polarity};
use esp_hal::time::Rate;
use esp_hal::Blocking;

use vitrine_core::bounce::{RefillWindow, StagingSlot};
use vitrine_core::error::DisplayError;
use vitrine_core::timing::{achievable_pclk, pclk_within_tolerance, ScanTimings};

use crate::framestore::FrameStore;

/// Root clock feeding the LCD pixel clock divider
pub const LCD_CLOCK_ROOT_HZ: u32 = 160_000_000;

/// Check the timing generator can approximate the requested pixel clock;
/// returns the rate an integer divider will actually achieve.
pub fn check_pclk(timings: &ScanTimings) -> Result<u32, DisplayError> {
    let achieved = achievable_pclk(LCD_CLOCK_ROOT_HZ, timings.pclk_hz);
    if pclk_within_tolerance(timings.pclk_hz, achieved) {
        Ok(achieved)
    } else {
        Err(DisplayError::ConfigRejected)
    }
}

/// Peripheral configuration for a timing set.
///
/// The esp-hal timing fields count differently from panel datasheets:
/// both "blank front porch" fields run from the start of the blanking to
/// the start of active data, sync pulse included.
pub fn dpi_config(t: &ScanTimings) -> DpiConfig {
    DpiConfig::default()
        .with_frequency(Rate::from_hz(t.pclk_hz))
        .with_clock_mode(ClockMode {
            polarity: if t.pclk_active_falling {
                Polarity::IdleHigh
            } else {
                Polarity::IdleLow
            },
            phase: Phase::ShiftLow,
        })
        .with_format(Format {
            enable_2byte_mode: true,
            ..Default::default()
        })
        .with_timing(FrameTiming {
            horizontal_active_width: t.h_res as usize,
            horizontal_total_width: t.total_columns() as usize,
            horizontal_blank_front_porch: (t.hsync_pulse + t.hsync_back_porch) as usize,
            vertical_active_height: t.v_res as usize,
            vertical_total_height: t.total_lines() as usize,
            vertical_blank_front_porch: (t.vsync_pulse + t.vsync_back_porch) as usize,
            hsync_width: t.hsync_pulse as usize,
            vsync_width: t.vsync_pulse as usize,
            hsync_position: 0,
        })
        .with_vsync_idle_level(Level::High)
        .with_hsync_idle_level(Level::High)
        .with_de_idle_level(Level::Low)
        .with_disable_black_region(false)
}

/// Wrap a statically allocated staging region as the DMA loop source
pub fn staging_loop_buf(
    descriptors: &'static mut [DmaDescriptor],
    buffer: &'static mut [u8],
) -> Result<DmaLoopBuf, DisplayError> {
    DmaLoopBuf::new(descriptors, buffer).map_err(|_| DisplayError::BufferAllocationFailed)
}

/// Continuous scan-out through the two-slot staging region
pub struct StagedScanout {
    transfer: DpiTransfer<'static, DmaLoopBuf, Blocking>,
    slot_bytes: usize,
}

impl StagedScanout {
    /// Start the engine free-running over the staging loop buffer.
    /// `slot_bytes` is the size of one staging slot (half the region).
    pub fn start(
        dpi: Dpi<'static, Blocking>,
        staging: DmaLoopBuf,
        slot_bytes: usize,
    ) -> Result<Self, DisplayError> {
        let transfer = dpi
            .send(true, staging)
            .map_err(|_| DisplayError::ConfigRejected)?;
        Ok(Self {
            transfer,
            slot_bytes,
        })
    }

    /// Copy one refill window into its staging slot while the engine
    /// drains the other.
    pub fn refill(&mut self, window: &RefillWindow, src: &[u8]) {
        let base = match window.slot {
            StagingSlot::First => 0,
            StagingSlot::Second => self.slot_bytes,
        };
        self.transfer[base..base + src.len()].copy_from_slice(src);
    }
}

/// Per-frame scan-out straight from the PSRAM scan buffers
pub struct DirectScanout {
    dpi: Option<Dpi<'static, Blocking>>,
    buffers: [Option<DmaTxBuf>; 2],
    active: Option<(DpiTransfer<'static, DmaTxBuf, Blocking>, usize)>,
}

impl DirectScanout {
    /// Build DMA sources over both scan buffers.
    pub fn new(
        dpi: Dpi<'static, Blocking>,
        store: &FrameStore,
        descriptors: [&'static mut [DmaDescriptor]; 2],
    ) -> Result<Self, DisplayError> {
        let mut buffers = [None, None];
        for (index, desc) in descriptors.into_iter().enumerate() {
            // SAFETY: this is the scan-side view of the buffer; the swap
            // protocol keeps the renderer on the other one.
            let bytes = unsafe { store.bytes_mut(index) };
            let buf = DmaTxBuf::new_with_config(desc, bytes, ExternalBurstConfig::Size64)
                .map_err(|_| DisplayError::BufferAllocationFailed)?;
            buffers[index] = Some(buf);
        }
        Ok(Self {
            dpi: Some(dpi),
            buffers,
            active: None,
        })
    }

    /// Begin streaming one frame from scan buffer `index`. Any previous
    /// frame is reaped first.
    pub fn begin_frame(&mut self, index: usize) -> Result<(), DmaError> {
        self.finish_frame()?;

        let (Some(dpi), Some(buf)) = (self.dpi.take(), self.buffers[index].take()) else {
            // Unreachable once finish_frame has reaped the transfer, but
            // restoring nothing and skipping the frame beats poisoning
            // the engine.
            return Ok(());
        };

        match dpi.send(false, buf) {
            Ok(transfer) => {
                self.active = Some((transfer, index));
                Ok(())
            }
            Err((err, dpi, buf)) => {
                self.dpi = Some(dpi);
                self.buffers[index] = Some(buf);
                Err(err)
            }
        }
    }

    /// True when no frame is in flight or the in-flight frame finished
    pub fn frame_done(&self) -> bool {
        self.active
            .as_ref()
            .map(|(transfer, _)| transfer.is_done())
            .unwrap_or(true)
    }

    /// Wait out the in-flight frame and reclaim the peripheral
    pub fn finish_frame(&mut self) -> Result<(), DmaError> {
        if let Some((transfer, index)) = self.active.take() {
            let (result, dpi, buf) = transfer.wait();
            self.dpi = Some(dpi);
            self.buffers[index] = Some(buf);
            result?;
        }
        Ok(())
    }
}
