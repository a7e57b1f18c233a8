//! GT911 capacitive touch controller driver
//!
//! The GT911 is polled over I2C: a status register reports whether a
//! coordinate frame is ready (bit 7) and how many touches it holds (low
//! nibble), and an 8-byte point block carries the first touch. The
//! status register must be cleared after every consumed event or the
//! device never reports another one.
//!
//! Depending on reset strapping the controller answers at 0x5D or 0x14;
//! discovery probes both. Runtime polling is best-effort: a failed bus
//! transaction means "no touch this cycle" and the next poll starts
//! clean.

use vitrine_core::error::TouchInitError;
use vitrine_core::touch::TouchSample;
use vitrine_hal::i2c::I2cBus;

/// GT911 register addresses
pub mod reg {
    /// Status: bit7 = coordinate frame ready, bits 3:0 = touch count
    pub const STATUS: u16 = 0x814E;
    /// First touch point block (8 bytes:
    /// track id, x lo/hi, y lo/hi, size lo/hi, reserved)
    pub const POINT0: u16 = 0x8150;
    /// Product ID (4 ASCII bytes)
    pub const PRODUCT_ID: u16 = 0x8140;
}

/// Primary I2C address (INT low at reset release)
pub const PRIMARY_ADDRESS: u8 = 0x5D;
/// Documented alternate address (INT high at reset release)
pub const FALLBACK_ADDRESS: u8 = 0x14;

const STATUS_READY: u8 = 0x80;
const STATUS_COUNT_MASK: u8 = 0x0F;

/// GT911 driver: owns its bus handle and the last reported position
pub struct Gt911<B> {
    bus: B,
    address: u8,
    width: u16,
    height: u16,
    last_x: u16,
    last_y: u16,
    pressed: bool,
}

impl<B: I2cBus> Gt911<B> {
    /// Discover the controller on the bus.
    ///
    /// Probes the primary address, then the documented alternate; fails
    /// with [`TouchInitError::DeviceNotFound`] only if neither answers.
    /// `width`/`height` bound the coordinates of every reported sample.
    pub fn detect(mut bus: B, width: u16, height: u16) -> Result<Self, TouchInitError> {
        let address = if bus.probe(PRIMARY_ADDRESS).is_ok() {
            PRIMARY_ADDRESS
        } else if bus.probe(FALLBACK_ADDRESS).is_ok() {
            FALLBACK_ADDRESS
        } else {
            return Err(TouchInitError::DeviceNotFound);
        };

        Ok(Self {
            bus,
            address,
            width,
            height,
            last_x: 0,
            last_y: 0,
            pressed: false,
        })
    }

    /// Address the controller answered at
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Drop any event latched before we started watching.
    ///
    /// Failure here is not fatal - a stale event only delays the first
    /// report by one poll cycle.
    pub fn init(&mut self) -> Result<(), B::Error> {
        self.clear_status()
    }

    /// Product identifier, e.g. `"911"` plus a NUL. Advisory: callers
    /// log it, and a failed read does not block initialization.
    pub fn read_product_id(&mut self) -> Result<[u8; 4], B::Error> {
        let mut id = [0u8; 4];
        self.read_reg(reg::PRODUCT_ID, &mut id)?;
        Ok(id)
    }

    fn read_reg(&mut self, register: u16, buf: &mut [u8]) -> Result<(), B::Error> {
        let pointer = register.to_be_bytes();
        self.bus.write_read(self.address, &pointer, buf)
    }

    fn clear_status(&mut self) -> Result<(), B::Error> {
        let [hi, lo] = reg::STATUS.to_be_bytes();
        self.bus.write(self.address, &[hi, lo, 0x00])
    }

    /// Report the end of a touch exactly once
    fn end_of_touch(&mut self) -> Option<TouchSample> {
        if self.pressed {
            self.pressed = false;
            Some(TouchSample::released_at(self.last_x, self.last_y))
        } else {
            None
        }
    }

    /// One poll cycle of the sampling state machine.
    ///
    /// Reads the status register; when no coordinate frame is ready
    /// nothing else touches the bus. A ready frame with a zero count is
    /// consumed (status cleared) and reported as no touch. A ready frame
    /// with at least one touch reads the first point block, clears the
    /// status, and yields a pressed sample clamped to the panel
    /// resolution.
    pub fn try_poll(&mut self) -> Result<Option<TouchSample>, B::Error> {
        let mut status = [0u8; 1];
        self.read_reg(reg::STATUS, &mut status)?;

        let ready = status[0] & STATUS_READY != 0;
        let touches = status[0] & STATUS_COUNT_MASK;

        if !ready {
            return Ok(self.end_of_touch());
        }
        if touches == 0 {
            self.clear_status()?;
            return Ok(self.end_of_touch());
        }

        let mut point = [0u8; 8];
        let read = self.read_reg(reg::POINT0, &mut point);
        // Clear even when the point read failed: leaving the ready bit
        // set wedges the controller on this event forever.
        self.clear_status()?;
        read?;

        let raw_x = u16::from_le_bytes([point[1], point[2]]);
        let raw_y = u16::from_le_bytes([point[3], point[4]]);

        let sample = TouchSample::pressed_at(raw_x, raw_y, self.width, self.height);
        self.last_x = sample.x;
        self.last_y = sample.y;
        self.pressed = true;
        Ok(Some(sample))
    }

    /// Best-effort poll: bus failures are swallowed and read as "no
    /// touch this cycle".
    pub fn poll(&mut self) -> Option<TouchSample> {
        match self.try_poll() {
            Ok(sample) => sample,
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct MockErr;

    struct MockBus {
        /// Addresses that acknowledge a probe
        ack: &'static [u8],
        /// Successive STATUS register values (0x00 once exhausted)
        status_seq: heapless::Deque<u8, 8>,
        point: [u8; 8],
        fail_status_read: bool,
        fail_point_read: bool,
        /// Recorded register writes (register, first data byte)
        writes: heapless::Vec<(u16, u8), 8>,
        point_reads: usize,
        probes: heapless::Vec<u8, 4>,
    }

    impl MockBus {
        fn with_status(ack: &'static [u8], statuses: &[u8]) -> Self {
            let mut bus = Self {
                ack,
                status_seq: heapless::Deque::new(),
                point: [0; 8],
                fail_status_read: false,
                fail_point_read: false,
                writes: heapless::Vec::new(),
                point_reads: 0,
                probes: heapless::Vec::new(),
            };
            for &s in statuses {
                bus.status_seq.push_back(s).unwrap();
            }
            bus
        }
    }

    impl I2cBus for MockBus {
        type Error = MockErr;

        fn write(&mut self, address: u8, data: &[u8]) -> Result<(), MockErr> {
            if data.is_empty() {
                self.probes.push(address).unwrap();
                return if self.ack.contains(&address) {
                    Ok(())
                } else {
                    Err(MockErr)
                };
            }
            let register = u16::from_be_bytes([data[0], data[1]]);
            self.writes.push((register, data[2])).unwrap();
            Ok(())
        }

        fn read(&mut self, _address: u8, buf: &mut [u8]) -> Result<(), MockErr> {
            buf.fill(0);
            Ok(())
        }

        fn write_read(
            &mut self,
            _address: u8,
            write_data: &[u8],
            read_buf: &mut [u8],
        ) -> Result<(), MockErr> {
            let register = u16::from_be_bytes([write_data[0], write_data[1]]);
            match register {
                reg::STATUS => {
                    if self.fail_status_read {
                        return Err(MockErr);
                    }
                    read_buf[0] = self.status_seq.pop_front().unwrap_or(0x00);
                    Ok(())
                }
                reg::POINT0 => {
                    self.point_reads += 1;
                    if self.fail_point_read {
                        return Err(MockErr);
                    }
                    read_buf.copy_from_slice(&self.point);
                    Ok(())
                }
                reg::PRODUCT_ID => {
                    read_buf.copy_from_slice(b"911\0");
                    Ok(())
                }
                _ => Err(MockErr),
            }
        }
    }

    fn touch(bus: MockBus) -> Gt911<MockBus> {
        Gt911::detect(bus, 480, 480).unwrap()
    }

    #[test]
    fn test_single_touch_reported_pressed() {
        let mut bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[0x81]);
        // track id 0, x = 0x012C (300), y = 0x00C8 (200), size 0x0010
        bus.point = [0x00, 0x2C, 0x01, 0xC8, 0x00, 0x10, 0x00, 0x00];
        let mut t = touch(bus);

        let sample = t.try_poll().unwrap().unwrap();
        assert_eq!((sample.x, sample.y, sample.pressed), (300, 200, true));
        assert_eq!(t.bus.point_reads, 1);
        assert_eq!(t.bus.writes.as_slice(), &[(reg::STATUS, 0x00)]);
    }

    #[test]
    fn test_overhang_coordinates_clamped() {
        let mut bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[0x81]);
        // x = 500 on a 480-wide panel
        bus.point = [0x00, 0xF4, 0x01, 0x64, 0x00, 0x00, 0x00, 0x00];
        let mut t = touch(bus);

        let sample = t.try_poll().unwrap().unwrap();
        assert_eq!(sample.x, 479);
        assert_eq!(sample.y, 100);
    }

    #[test]
    fn test_not_ready_touches_nothing_else() {
        let bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[0x00]);
        let mut t = touch(bus);

        assert_eq!(t.try_poll().unwrap(), None);
        assert_eq!(t.bus.point_reads, 0);
        assert!(t.bus.writes.is_empty());
    }

    #[test]
    fn test_ready_with_zero_count_clears_and_reports_no_touch() {
        let bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[0x80]);
        let mut t = touch(bus);

        assert_eq!(t.try_poll().unwrap(), None);
        assert_eq!(t.bus.point_reads, 0);
        assert_eq!(t.bus.writes.as_slice(), &[(reg::STATUS, 0x00)]);
    }

    #[test]
    fn test_one_clear_per_event_and_release_reported_once() {
        let mut bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[0x81, 0x00, 0x00]);
        bus.point = [0x00, 0x2C, 0x01, 0xC8, 0x00, 0x10, 0x00, 0x00];
        let mut t = touch(bus);

        let pressed = t.try_poll().unwrap().unwrap();
        assert!(pressed.pressed);

        // Touch ended: one released sample at the last position...
        let released = t.try_poll().unwrap().unwrap();
        assert_eq!((released.x, released.y, released.pressed), (300, 200, false));

        // ...then silence, with no extra point reads or status writes.
        assert_eq!(t.try_poll().unwrap(), None);
        assert_eq!(t.bus.point_reads, 1);
        assert_eq!(t.bus.writes.len(), 1);
    }

    #[test]
    fn test_discovery_falls_back_to_alternate_address() {
        let bus = MockBus::with_status(&[FALLBACK_ADDRESS], &[]);
        let t = touch(bus);
        assert_eq!(t.address(), FALLBACK_ADDRESS);
        assert_eq!(t.bus.probes.as_slice(), &[PRIMARY_ADDRESS, FALLBACK_ADDRESS]);
    }

    #[test]
    fn test_discovery_prefers_primary_address() {
        let bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[]);
        let t = touch(bus);
        assert_eq!(t.address(), PRIMARY_ADDRESS);
        assert_eq!(t.bus.probes.as_slice(), &[PRIMARY_ADDRESS]);
    }

    #[test]
    fn test_discovery_fails_when_both_addresses_silent() {
        let bus = MockBus::with_status(&[], &[]);
        match Gt911::detect(bus, 480, 480) {
            Err(TouchInitError::DeviceNotFound) => {}
            other => panic!("expected DeviceNotFound, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_bus_error_swallowed_by_poll() {
        let mut bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[]);
        bus.fail_status_read = true;
        let mut t = touch(bus);

        assert!(t.try_poll().is_err());
        assert_eq!(t.poll(), None);
        // A failed cycle leaves no phantom press behind
        t.bus.fail_status_read = false;
        assert_eq!(t.try_poll().unwrap(), None);
    }

    #[test]
    fn test_status_cleared_even_when_point_read_fails() {
        let mut bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[0x81]);
        bus.fail_point_read = true;
        let mut t = touch(bus);

        assert!(t.try_poll().is_err());
        assert_eq!(t.bus.writes.as_slice(), &[(reg::STATUS, 0x00)]);
    }

    #[test]
    fn test_init_clears_stale_event() {
        let bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[]);
        let mut t = touch(bus);
        t.init().unwrap();
        assert_eq!(t.bus.writes.as_slice(), &[(reg::STATUS, 0x00)]);
    }

    #[test]
    fn test_product_id_read() {
        let bus = MockBus::with_status(&[PRIMARY_ADDRESS], &[]);
        let mut t = touch(bus);
        assert_eq!(t.read_product_id().unwrap(), *b"911\0");
    }
}
