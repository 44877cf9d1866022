//! LED display sink

/// Highest brightness level a display sink accepts (16 intensity steps)
pub const BRIGHTNESS_MAX: u8 = 15;

/// What a single digit position should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Glyph {
    /// All segments off
    Blank,
    /// Decimal digit 0-9
    Digit(u8),
}

impl Glyph {
    /// Digit glyph for `value`, or `Blank` if it is not a single decimal digit
    pub const fn digit(value: u8) -> Self {
        if value <= 9 {
            Glyph::Digit(value)
        } else {
            Glyph::Blank
        }
    }
}

/// Multi-digit LED display
///
/// The sink has no logic of its own beyond translating these commands into
/// hardware signals. Commands are assumed to always succeed; drivers log
/// bus errors rather than report them.
pub trait DisplaySink {
    /// Show `glyph` at digit `position`
    fn set_digit(&mut self, position: u8, glyph: Glyph);

    /// Switch a single discrete LED segment
    ///
    /// - `group`: segment group (a digit row on multiplexed drivers)
    /// - `index`: segment within the group
    fn set_segment(&mut self, group: u8, index: u8, on: bool);

    /// Set display intensity, `0..=BRIGHTNESS_MAX`
    fn set_brightness(&mut self, level: u8);
}

impl<T: DisplaySink + ?Sized> DisplaySink for &mut T {
    fn set_digit(&mut self, position: u8, glyph: Glyph) {
        (**self).set_digit(position, glyph)
    }

    fn set_segment(&mut self, group: u8, index: u8, on: bool) {
        (**self).set_segment(group, index, on)
    }

    fn set_brightness(&mut self, level: u8) {
        (**self).set_brightness(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_digit() {
        assert_eq!(Glyph::digit(0), Glyph::Digit(0));
        assert_eq!(Glyph::digit(9), Glyph::Digit(9));
        assert_eq!(Glyph::digit(10), Glyph::Blank);
    }
}
