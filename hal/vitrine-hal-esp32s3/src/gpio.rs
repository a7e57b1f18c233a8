//! GPIO adapter

use esp_hal::gpio::Output;
use vitrine_hal::gpio::OutputPin;

/// Push-pull output pin adapter over an esp-hal [`Output`]
pub struct Pin<'d>(pub Output<'d>);

impl OutputPin for Pin<'_> {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }

    fn is_set_high(&self) -> bool {
        self.0.is_set_high()
    }
}
