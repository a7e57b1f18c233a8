//! Hardware driver implementations
//!
//! This crate provides the device drivers for the Vitrine display stack:
//!
//! - Panel controller (ST7701S) over a bit-banged 3-wire serial bus
//! - Capacitive touch controller (GT911) over I2C
//!
//! Drivers are generic over the traits in `vitrine-hal` plus
//! `embedded_hal::delay::DelayNs`, so they run against mock pins and
//! buses in the host test suite.

#![no_std]
#![deny(unsafe_code)]

pub mod panel;
pub mod touch;
