//! Touch polling task
//!
//! Polls the touch controller on a fixed period and forwards samples to
//! the UI layer. Polling is best-effort: a failed bus transaction is
//! "no touch this cycle" and the next poll starts clean.

use embassy_time::{Duration, Ticker};
use log::{debug, trace};

use vitrine_drivers::touch::Gt911;
use vitrine_hal_esp32s3::i2c::Bus;

use crate::channels::TOUCH_SAMPLES;

#[embassy_executor::task]
pub async fn touch_task(mut touch: Gt911<Bus<'static>>, poll_ms: u32) {
    debug!("touch task started ({} ms poll interval)", poll_ms);

    let mut ticker = Ticker::every(Duration::from_millis(poll_ms as u64));
    loop {
        ticker.next().await;

        match touch.try_poll() {
            Ok(Some(sample)) => {
                if TOUCH_SAMPLES.try_send(sample).is_err() {
                    debug!("touch queue full; dropping sample");
                }
            }
            Ok(None) => {}
            Err(_) => trace!("touch poll failed; no touch this cycle"),
        }
    }
}
