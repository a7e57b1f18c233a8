//! Frame buffer ownership accounting
//!
//! Two scan buffers exist; at any instant one is owned by the renderer
//! (being drawn) and the other by the streaming engine (being scanned
//! out), never both. Ownership transfers by exchanging indices at a
//! frame boundary - no pixels move, so a swap costs the same at any
//! resolution.
//!
//! [`FrameManager`] is the single source of truth for which buffer is
//! which. Everything that touches buffer memory goes through its indices;
//! the swap protocol is the whole tear-free correctness argument.

/// Number of scan buffers
pub const BUFFER_COUNT: usize = 2;

/// Double-buffer ownership state
///
/// Starts with buffer 0 owned by the renderer and buffer 1 being scanned
/// out, so a freshly initialized pipeline scans cleared memory while the
/// first frame is drawn.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameManager {
    back: usize,
    swaps: u32,
    unsynced_swaps: u32,
}

impl FrameManager {
    /// Create the accounting state for a fresh pipeline
    pub const fn new() -> Self {
        Self {
            back: 0,
            swaps: 0,
            unsynced_swaps: 0,
        }
    }

    /// Index of the buffer the renderer may draw into
    pub fn back_index(&self) -> usize {
        self.back
    }

    /// Index of the buffer the streaming engine reads
    pub fn scan_index(&self) -> usize {
        1 - self.back
    }

    /// Exchange buffer ownership.
    ///
    /// Must only be called once a frame boundary has been observed since
    /// the previous swap; `synced = false` records the degraded path where
    /// the boundary wait timed out and the swap proceeded anyway (risking
    /// one torn frame, never corrupting the accounting). Returns the new
    /// scan index for publication to the streaming engine.
    pub fn swap(&mut self, synced: bool) -> usize {
        self.back = 1 - self.back;
        self.swaps = self.swaps.wrapping_add(1);
        if !synced {
            self.unsynced_swaps = self.unsynced_swaps.wrapping_add(1);
        }
        self.scan_index()
    }

    /// Total swaps performed
    pub fn swap_count(&self) -> u32 {
        self.swaps
    }

    /// Swaps performed without a fresh frame-boundary signal
    pub fn unsynced_swap_count(&self) -> u32 {
        self.unsynced_swaps
    }
}

impl Default for FrameManager {
    fn default() -> Self {
        Self::new()
    }
}
