//! ESP32-S3 implementation of the Vitrine HAL
//!
//! Adapts `esp-hal` peripherals to the traits in `vitrine-hal` and hosts
//! the chip-specific halves of the display pipeline:
//!
//! - [`gpio::Pin`] / [`i2c::Bus`] - trait adapters over esp-hal GPIO and I2C
//! - [`framestore::FrameStore`] - double frame store in PSRAM
//! - [`scanout`] - RGB scan-out over the LCD_CAM DPI peripheral, staged
//!   through internal SRAM or direct from PSRAM
//!
//! This crate only builds for the xtensa target and is excluded from the
//! workspace default members.

#![no_std]

extern crate alloc;

pub mod framestore;
pub mod gpio;
pub mod i2c;
pub mod scanout;
