//! Rendering the time onto the LED display

use hal_abstractions::{DisplaySink, Glyph};

use crate::time::DisplayFormat;

/// Number of bars in the seconds bargraph
pub const BARGRAPH_LEN: u8 = 10;

/// Where each element sits on the display driver
///
/// The defaults match the wiring of the original clock board, where the
/// digit positions are not in left-to-right order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaceLayout {
    pub hour_tens: u8,
    pub hour_ones: u8,
    pub minute_tens: u8,
    pub minute_ones: u8,
    /// Segment groups holding bars 0-4 and 5-9 of the seconds bargraph
    pub bargraph_groups: [u8; 2],
    /// `(group, index)` of the once-a-second flasher
    pub flasher: (u8, u8),
}

impl Default for FaceLayout {
    fn default() -> Self {
        Self {
            hour_tens: 6,
            hour_ones: 0,
            minute_tens: 1,
            minute_ones: 5,
            bargraph_groups: [7, 3],
            flasher: (0, 0),
        }
    }
}

/// Stateless renderer for one `FaceLayout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockFace {
    layout: FaceLayout,
}

impl ClockFace {
    pub const fn new(layout: FaceLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FaceLayout {
        &self.layout
    }

    /// Draw the four digits, the seconds bargraph and the flasher
    pub fn render<D: DisplaySink + ?Sized>(&self, time: &DisplayFormat, second: u8, display: &mut D) {
        let layout = &self.layout;

        let hour_tens = time.hour_tens.map_or(Glyph::Blank, Glyph::digit);
        display.set_digit(layout.hour_tens, hour_tens);
        display.set_digit(layout.hour_ones, Glyph::digit(time.hour_ones));
        display.set_digit(layout.minute_tens, Glyph::digit(time.minute_tens));
        display.set_digit(layout.minute_ones, Glyph::digit(time.minute_ones));

        let lit = bars_lit(second);
        for bar in 0..BARGRAPH_LEN {
            let group = layout.bargraph_groups[(bar / 5) as usize];
            display.set_segment(group, bar % 5, bar < lit);
        }

        let (group, index) = layout.flasher;
        display.set_segment(group, index, second % 2 == 1);
    }
}

/// Bars lit for `second`: one at :00, all ten from :54
pub const fn bars_lit(second: u8) -> u8 {
    let bars = second / 6 + 1;
    if bars > BARGRAPH_LEN {
        BARGRAPH_LEN
    } else {
        bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_lit() {
        assert_eq!(bars_lit(0), 1);
        assert_eq!(bars_lit(5), 1);
        assert_eq!(bars_lit(6), 2);
        assert_eq!(bars_lit(53), 9);
        assert_eq!(bars_lit(54), 10);
        assert_eq!(bars_lit(59), 10);
    }
}
