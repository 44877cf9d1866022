#![deny(unsafe_code)]
//! MAX7219 LED driver
//!
//! The MAX7219 multiplexes eight digit rows of eight segments each. We run
//! it in no-decode mode so every segment is addressable: digit positions
//! get a seven-segment pattern, while the bargraph and flasher LEDs are
//! individual bits in other rows. A shadow copy of the rows lets single
//! segments change without reading the chip back.
//!
//! Row bit layout (no-decode): `DP A B C D E F G`, DP in bit 7. Segment
//! index 0 is DP, index 7 is G.

use defmt::{debug, warn, Debug2Format};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use hal_abstractions::{DisplaySink, Glyph, BRIGHTNESS_MAX};

const REG_DIGIT0: u8 = 0x01;
const REG_DECODE_MODE: u8 = 0x09;
const REG_INTENSITY: u8 = 0x0A;
const REG_SCAN_LIMIT: u8 = 0x0B;
const REG_SHUTDOWN: u8 = 0x0C;
const REG_DISPLAY_TEST: u8 = 0x0F;

const ROWS: usize = 8;
const DP: u8 = 0b1000_0000;

/// Seven-segment patterns for 0-9, no-decode bit order
const DIGIT_FONT: [u8; 10] = [
    0b0111_1110, // 0
    0b0011_0000, // 1
    0b0110_1101, // 2
    0b0111_1001, // 3
    0b0011_0011, // 4
    0b0101_1011, // 5
    0b0101_1111, // 6
    0b0111_0000, // 7
    0b0111_1111, // 8
    0b0111_1011, // 9
];

/// MAX7219 on a write-only SPI bus with a GPIO chip select
pub struct Max7219<SPI, CS> {
    spi: SPI,
    cs: CS,
    rows: [u8; ROWS],
}

impl<SPI, CS> Max7219<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    /// Take the bus and bring the chip out of shutdown with a blank display
    pub fn new(spi: SPI, cs: CS) -> Self {
        let mut display = Self {
            spi,
            cs,
            rows: [0; ROWS],
        };
        display.write(REG_DISPLAY_TEST, 0);
        display.write(REG_SCAN_LIMIT, (ROWS - 1) as u8);
        display.write(REG_DECODE_MODE, 0);
        display.clear();
        display.write(REG_SHUTDOWN, 1);
        debug!("MAX7219 initialized");
        display
    }

    /// Blank every row
    pub fn clear(&mut self) {
        for row in 0..ROWS {
            self.rows[row] = 0;
            self.write_row(row);
        }
    }

    fn write_row(&mut self, row: usize) {
        let value = self.rows[row];
        self.write(REG_DIGIT0 + row as u8, value);
    }

    /// Write one register; bus errors are logged and dropped
    fn write(&mut self, register: u8, value: u8) {
        if self.cs.set_low().is_err() {
            warn!("MAX7219 chip select failed");
            return;
        }
        let result = self
            .spi
            .write(&[register, value])
            .and_then(|()| self.spi.flush());
        if let Err(e) = result {
            warn!("MAX7219 write to {=u8:#x} failed: {:?}", register, Debug2Format(&e));
        }
        // Data latches on the rising edge
        let _ = self.cs.set_high();
    }
}

impl<SPI, CS> DisplaySink for Max7219<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    fn set_digit(&mut self, position: u8, glyph: Glyph) {
        let row = position as usize;
        if row >= ROWS {
            return;
        }
        let pattern = match glyph {
            Glyph::Digit(d) => DIGIT_FONT.get(d as usize).copied().unwrap_or(0),
            Glyph::Blank => 0,
        };
        // DP belongs to the discrete LED sharing this row
        let value = (self.rows[row] & DP) | pattern;
        if value != self.rows[row] {
            self.rows[row] = value;
            self.write_row(row);
        }
    }

    fn set_segment(&mut self, group: u8, index: u8, on: bool) {
        let row = group as usize;
        if row >= ROWS || index >= 8 {
            return;
        }
        let bit = DP >> index;
        let value = if on {
            self.rows[row] | bit
        } else {
            self.rows[row] & !bit
        };
        if value != self.rows[row] {
            self.rows[row] = value;
            self.write_row(row);
        }
    }

    fn set_brightness(&mut self, level: u8) {
        self.write(REG_INTENSITY, level.min(BRIGHTNESS_MAX));
    }
}
