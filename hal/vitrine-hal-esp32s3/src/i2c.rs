//! I2C adapter

use esp_hal::i2c::master::{Error, I2c};
use esp_hal::Blocking;
use vitrine_hal::i2c::I2cBus;

/// Blocking I2C master adapter over an esp-hal [`I2c`]
pub struct Bus<'d>(pub I2c<'d, Blocking>);

impl I2cBus for Bus<'_> {
    type Error = Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Error> {
        self.0.write(address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.0.read(address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Error> {
        self.0.write_read(address, write_data, read_buf)
    }
}
