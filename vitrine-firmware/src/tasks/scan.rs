//! Scan-out tasks
//!
//! Continuous frame streaming: pick up the published scan buffer at
//! each frame start, feed the engine, raise the frame-boundary signal
//! once per frame. Refill overruns and DMA hiccups are soft failures -
//! logged, counted, and gone by the next frame - so the loop never
//! stops.

use embassy_time::{Duration, Instant, Ticker, Timer};
use log::{debug, warn};
use portable_atomic::Ordering;

use vitrine_core::bounce::BounceCursor;
use vitrine_core::config::PanelProfile;
use vitrine_hal_esp32s3::framestore::FrameStore;
use vitrine_hal_esp32s3::scanout::{DirectScanout, StagedScanout};

use crate::channels::{FRAME_BOUNDARY, SCAN_BUFFER};

/// Poll interval while a direct-mode frame transfer is in flight
const FRAME_POLL: Duration = Duration::from_micros(500);

/// Direct mode: whole frames stream from the PSRAM scan buffer.
#[embassy_executor::task]
pub async fn scan_direct_task(mut engine: DirectScanout) {
    debug!("scan task started (direct mode)");

    loop {
        let index = SCAN_BUFFER.load(Ordering::Acquire);

        if let Err(e) = engine.begin_frame(index) {
            warn!("frame transfer failed to start: {:?}", e);
            Timer::after(FRAME_POLL).await;
            continue;
        }
        while !engine.frame_done() {
            Timer::after(FRAME_POLL).await;
        }
        if let Err(e) = engine.finish_frame() {
            // One corrupted frame; the next transfer starts clean.
            warn!("frame transfer error: {:?}", e);
        }

        FRAME_BOUNDARY.signal(());
    }
}

/// Staged mode: refill the two-slot SRAM staging region in step with
/// the engine's drain rate.
#[embassy_executor::task]
pub async fn scan_staged_task(mut engine: StagedScanout, store: FrameStore, profile: PanelProfile) {
    let timings = profile.scan_timings();
    let line_bytes = profile.line_bytes();
    let mut cursor = BounceCursor::new(profile.v_res, profile.bounce_lines);

    // One slot's worth of drain time paces the refills and bounds how
    // long each copy may take before the engine reaches the unfilled tail.
    let slot_budget = Duration::from_micros(timings.refill_budget_us(profile.bounce_lines).max(1));
    let mut ticker = Ticker::every(slot_budget);

    debug!(
        "scan task started ({} line staging slots, {} us drain budget)",
        profile.bounce_lines,
        slot_budget.as_micros()
    );

    let mut index = SCAN_BUFFER.load(Ordering::Acquire);
    loop {
        let window = cursor.next_refill();
        if window.first_line == 0 {
            // Buffer handoff happens only between frames.
            index = SCAN_BUFFER.load(Ordering::Acquire);
        }

        // SAFETY: `index` is the published scan buffer; the renderer
        // writes only the other one until the next boundary.
        let frame = unsafe { store.bytes(index) };
        let start = window.first_line as usize * line_bytes;
        let len = window.line_count as usize * line_bytes;

        let begun = Instant::now();
        engine.refill(&window, &frame[start..start + len]);
        if begun.elapsed() > slot_budget {
            cursor.record_underrun();
            warn!(
                "staging refill overran its drain budget ({} total)",
                cursor.underrun_count()
            );
        }

        if window.ends_frame {
            FRAME_BOUNDARY.signal(());
        }

        ticker.next().await;
    }
}
