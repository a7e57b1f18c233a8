//! Vitrine kiosk display firmware
//!
//! Firmware binary for the Guition ESP32-S3-4848S040 class of kiosk
//! boards: 480x480 RGB565 panel behind an ST7701S controller (register
//! init over bit-banged 3-wire serial, pixels over the 16-bit RGB bus)
//! and a GT911 touch controller on I2C.
//!
//! Bring-up order matters: panel registers first, then the timing
//! generator and scan buffers, backlight last so configuration noise
//! never reaches the glass. The demo render loop draws a channel-mapping
//! test pattern and echoes touch input; a real UI replaces exactly that
//! loop, using [`display::Display::back_buffer`] and
//! [`display::Display::flush`].

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::dma::{DmaDescriptor, CHUNK_SIZE};
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::lcd_cam::lcd::dpi::Dpi;
use esp_hal::lcd_cam::LcdCam;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{info, warn};
use static_cell::StaticCell;

use vitrine_core::config::PanelProfile;
use vitrine_drivers::panel::st7701::{self, St7701, ThreeWireBus, ThreeWireConfig};
use vitrine_drivers::touch::gt911::{self, Gt911};
use vitrine_hal_esp32s3::framestore::FrameStore;
use vitrine_hal_esp32s3::gpio::Pin;
use vitrine_hal_esp32s3::i2c::Bus;
use vitrine_hal_esp32s3::scanout::{self, DirectScanout, StagedScanout};

mod channels;
mod display;
mod tasks;

use crate::display::Display;

// Static DMA plumbing, sized for the default 480x480 RGB565 profile.
const FRAME_BYTES: usize = 480 * 480 * 2;
const FRAME_DESCRIPTORS: usize = FRAME_BYTES.div_ceil(CHUNK_SIZE);
const BOUNCE_LINES: usize = 10;
const STAGING_BYTES: usize = 480 * 2 * BOUNCE_LINES * 2;
const STAGING_DESCRIPTORS: usize = STAGING_BYTES.div_ceil(CHUNK_SIZE);

static FRAME_DESC_A: StaticCell<[DmaDescriptor; FRAME_DESCRIPTORS]> = StaticCell::new();
static FRAME_DESC_B: StaticCell<[DmaDescriptor; FRAME_DESCRIPTORS]> = StaticCell::new();
static STAGING_DESC: StaticCell<[DmaDescriptor; STAGING_DESCRIPTORS]> = StaticCell::new();
static STAGING_BUF: StaticCell<[u8; STAGING_BYTES]> = StaticCell::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::_240MHz));

    // Internal heap for small allocations, PSRAM region for the frame store
    esp_alloc::heap_allocator!(size: 96 * 1024);
    esp_alloc::psram_allocator!(peripherals.PSRAM, esp_hal::psram);

    esp_println::logger::init_logger_from_env();
    info!("vitrine firmware starting");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timg0.timer0);

    let profile = PanelProfile::default();
    // The controller register sequence and the timing generator are one
    // logical configuration; refuse to start if they disagree.
    profile
        .validate(st7701::programmed_lines())
        .expect("panel profile inconsistent with controller init sequence");

    // Backlight off while configuring
    let mut backlight = Output::new(peripherals.GPIO38, Level::Low, OutputConfig::default());

    // ST7701S register init over bit-banged 3-wire serial
    let command_bus = ThreeWireBus::new(
        Pin(Output::new(peripherals.GPIO39, Level::High, OutputConfig::default())), // CS
        Pin(Output::new(peripherals.GPIO48, Level::High, OutputConfig::default())), // SCK
        Pin(Output::new(peripherals.GPIO47, Level::Low, OutputConfig::default())),  // SDA
        Delay::new(),
        ThreeWireConfig {
            edge_delay_ns: profile.spi_edge_delay_ns,
        },
    );
    St7701::new(command_bus).initialize();
    info!("panel controller configured");

    let timings = profile.scan_timings();
    let achieved_pclk = scanout::check_pclk(&timings).expect("pixel clock out of tolerance");
    info!(
        "scan timing: {}x{} @ {} Hz pclk ({} requested), {} mHz refresh",
        timings.h_res,
        timings.v_res,
        achieved_pclk,
        timings.pclk_hz,
        timings.refresh_rate_mhz()
    );

    let store = FrameStore::reserve(&profile).expect("scan buffer reservation failed");
    info!("2x {} byte scan buffers reserved", store.frame_bytes());

    let lcd_cam = LcdCam::new(peripherals.LCD_CAM);
    let dpi = Dpi::new(lcd_cam.lcd, peripherals.DMA_CH0, scanout::dpi_config(&timings))
        .expect("timing generator rejected configuration")
        .with_pclk(peripherals.GPIO21)
        .with_hsync(peripherals.GPIO16)
        .with_vsync(peripherals.GPIO17)
        .with_de(peripherals.GPIO18)
        // RGB565 data bus, wired B0..B4, G0..G5, R0..R4
        .with_data0(peripherals.GPIO7)
        .with_data1(peripherals.GPIO15)
        .with_data2(peripherals.GPIO8)
        .with_data3(peripherals.GPIO20)
        .with_data4(peripherals.GPIO3)
        .with_data5(peripherals.GPIO13)
        .with_data6(peripherals.GPIO14)
        .with_data7(peripherals.GPIO0)
        .with_data8(peripherals.GPIO4)
        .with_data9(peripherals.GPIO5)
        .with_data10(peripherals.GPIO6)
        .with_data11(peripherals.GPIO46)
        .with_data12(peripherals.GPIO9)
        .with_data13(peripherals.GPIO10)
        .with_data14(peripherals.GPIO11)
        .with_data15(peripherals.GPIO12);

    if profile.bounce_lines > 0 {
        assert_eq!(
            profile.bounce_lines as usize, BOUNCE_LINES,
            "staging statics sized for a different profile"
        );
        let staging = scanout::staging_loop_buf(
            STAGING_DESC.init([DmaDescriptor::EMPTY; STAGING_DESCRIPTORS]),
            STAGING_BUF.init([0u8; STAGING_BYTES]),
        )
        .expect("staging buffer setup failed");
        let engine = StagedScanout::start(dpi, staging, profile.line_bytes() * BOUNCE_LINES)
            .expect("scan-out engine failed to start");
        spawner
            .spawn(tasks::scan_staged_task(engine, store.clone(), profile))
            .unwrap();
    } else {
        let engine = DirectScanout::new(
            dpi,
            &store,
            [
                FRAME_DESC_A.init([DmaDescriptor::EMPTY; FRAME_DESCRIPTORS]),
                FRAME_DESC_B.init([DmaDescriptor::EMPTY; FRAME_DESCRIPTORS]),
            ],
        )
        .expect("scan-out engine failed to start");
        spawner.spawn(tasks::scan_direct_task(engine)).unwrap();
    }
    info!("scan-out running");

    // Touch bring-up; the display carries on without it if discovery fails
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_hz(profile.touch_i2c_hz)),
    )
    .expect("i2c controller init failed")
    .with_sda(peripherals.GPIO19)
    .with_scl(peripherals.GPIO45);

    match Gt911::detect(Bus(i2c), profile.h_res, profile.v_res) {
        Ok(mut touch) => {
            if touch.address() == gt911::FALLBACK_ADDRESS {
                warn!(
                    "touch controller found at fallback address {:#04x}",
                    touch.address()
                );
            }
            match touch.read_product_id() {
                Ok(id) => info!(
                    "touch product id: {}",
                    core::str::from_utf8(&id).unwrap_or("<non-ascii>").trim_end_matches('\0')
                ),
                Err(_) => warn!("could not read touch product id"),
            }
            if touch.init().is_err() {
                warn!("could not clear stale touch status");
            }
            spawner
                .spawn(tasks::touch_task(touch, profile.touch_poll_ms))
                .unwrap();
        }
        Err(_) => warn!("no touch controller at either address; running display-only"),
    }

    // Panel is scanning valid (black) data now
    backlight.set_high();
    info!("display ready");

    // Demo render loop - the stand-in for the real UI layer
    let mut display = Display::new(store);
    loop {
        draw_test_pattern(
            display.back_buffer(),
            profile.h_res as usize,
            profile.v_res as usize,
        );
        let _ = display.flush().await;

        while let Ok(sample) = channels::TOUCH_SAMPLES.try_receive() {
            info!(
                "touch {} at ({}, {})",
                if sample.pressed { "down" } else { "up" },
                sample.x,
                sample.y
            );
        }
    }
}

/// RGB565 with the board's channel wiring
const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

fn fill_rect(buf: &mut [u16], stride: usize, x: usize, y: usize, w: usize, h: usize, color: u16) {
    for row in y..y + h {
        buf[row * stride + x..row * stride + x + w].fill(color);
    }
}

/// Corner patches plus a centered box: verifies the RGB565 channel
/// mapping end to end (mis-wired data lines show up as swapped corner
/// colors, not as a crash).
fn draw_test_pattern(buf: &mut [u16], width: usize, height: usize) {
    const DARK_GRAY: u16 = rgb565(0x40, 0x40, 0x40);
    const RED: u16 = rgb565(0xFF, 0x00, 0x00);
    const GREEN: u16 = rgb565(0x00, 0xFF, 0x00);
    const BLUE: u16 = rgb565(0x00, 0x00, 0xFF);
    const WHITE: u16 = rgb565(0xFF, 0xFF, 0xFF);
    const PATCH: usize = 60;
    const MARGIN: usize = 20;

    buf.fill(DARK_GRAY);
    fill_rect(buf, width, (width - 200) / 2, (height - 200) / 2, 200, 200, WHITE);
    fill_rect(buf, width, MARGIN, MARGIN, PATCH, PATCH, RED);
    fill_rect(buf, width, width - MARGIN - PATCH, MARGIN, PATCH, PATCH, GREEN);
    fill_rect(buf, width, MARGIN, height - MARGIN - PATCH, PATCH, PATCH, BLUE);
    fill_rect(
        buf,
        width,
        width - MARGIN - PATCH,
        height - MARGIN - PATCH,
        PATCH,
        PATCH,
        WHITE,
    );
}
