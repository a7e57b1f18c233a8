//! Renderer-facing display handle
//!
//! Owns the frame ownership accounting and composes the flush path:
//! publish the finished frame, wait (bounded) for the frame boundary,
//! exchange buffers. The renderer draws straight into a real scan
//! buffer, so a flush moves indices, not pixels.

use embassy_time::{with_timeout, Duration};
use log::warn;
use portable_atomic::Ordering;

use vitrine_core::framebuf::FrameManager;
use vitrine_hal_esp32s3::framestore::FrameStore;

use crate::channels::{FRAME_BOUNDARY, SCAN_BUFFER};

/// Upper bound on one boundary wait. Many frame periods at the slowest
/// supported refresh, so only a stalled timing generator trips it.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Display {
    frames: FrameManager,
    store: FrameStore,
}

impl Display {
    pub fn new(store: FrameStore) -> Self {
        Self {
            frames: FrameManager::new(),
            store,
        }
    }

    /// The buffer the renderer may draw into - never the one being
    /// scanned out.
    pub fn back_buffer(&mut self) -> &mut [u16] {
        // SAFETY: FrameManager guarantees the back index differs from
        // the published scan index, so the engine never reads this
        // buffer while the borrow lives.
        unsafe { self.store.pixels_mut(self.frames.back_index()) }
    }

    /// Publish the drawn frame and exchange buffers at the boundary.
    ///
    /// Degrades rather than deadlocks: if no boundary arrives within
    /// [`FLUSH_TIMEOUT`] the swap proceeds unsynchronized - one frame
    /// may tear, the ownership accounting stays intact, and the
    /// pipeline continues. Returns whether the swap was synchronized.
    pub async fn flush(&mut self) -> bool {
        // Only a boundary observed after this point counts.
        FRAME_BOUNDARY.reset();
        SCAN_BUFFER.store(self.frames.back_index(), Ordering::Release);

        let synced = with_timeout(FLUSH_TIMEOUT, FRAME_BOUNDARY.wait())
            .await
            .is_ok();
        if !synced {
            warn!(
                "no frame boundary within {} ms; swapping unsynchronized ({} total)",
                FLUSH_TIMEOUT.as_millis(),
                self.frames.unsynced_swap_count() + 1
            );
        }
        self.frames.swap(synced);
        synced
    }
}
