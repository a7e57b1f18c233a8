//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy
//! tasks. Uses embassy-sync primitives for safe async communication.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use portable_atomic::AtomicUsize;

use vitrine_core::touch::TouchSample;

/// Queue capacity for touch samples awaiting the UI layer
const TOUCH_CHANNEL_SIZE: usize = 8;

/// Raised once per frame boundary by the scan-out task.
///
/// The producer only signals (non-blocking, no allocation); the renderer
/// is the single waiter and uses it to gate buffer swaps.
pub static FRAME_BOUNDARY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Index of the buffer the scan-out engine should read.
///
/// Published by the renderer when a frame is finished, picked up by the
/// engine at the next frame start - the atomic handoff that keeps the
/// engine and the renderer on different buffers.
pub static SCAN_BUFFER: AtomicUsize = AtomicUsize::new(1);

/// Pointer samples for the UI layer
pub static TOUCH_SAMPLES: Channel<CriticalSectionRawMutex, TouchSample, TOUCH_CHANNEL_SIZE> =
    Channel::new();
