//! Quadrature decoder for the rotary encoder.
//!
//! The decoder is fed from the CLK-line interrupt.  It keeps the last
//! sampled clock level so a handler that re-fires without the clock having
//! actually flipped leaves the count untouched.

use portable_atomic::{AtomicBool, AtomicI32, Ordering};

/// Net rotation accumulator shared between interrupt and main loop.
pub struct QuadratureDecoder {
    count: AtomicI32,
    last_clk: AtomicBool,
}

impl QuadratureDecoder {
    /// Create a decoder seeded with the clock level read at boot.
    pub const fn new(initial_clk: bool) -> Self {
        Self {
            count: AtomicI32::new(0),
            last_clk: AtomicBool::new(initial_clk),
        }
    }

    /// Re-seed the last clock level (after the pin has been configured).
    pub fn reset(&self, clk: bool) {
        self.last_clk.store(clk, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }

    /// Interrupt-side entry point: sample of both lines at a CLK edge.
    ///
    /// Lines that differ after a clock change mean clockwise (+1), lines
    /// that match mean counter-clockwise (-1).
    pub fn on_clock_edge(&self, clk: bool, dt: bool) {
        let previous = self.last_clk.swap(clk, Ordering::AcqRel);
        if previous == clk {
            return;
        }
        if clk != dt {
            self.count.fetch_add(1, Ordering::AcqRel);
        } else {
            self.count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Main-loop side: net steps since the previous call, clearing the
    /// accumulator in the same atomic operation.
    pub fn take_delta(&self) -> i32 {
        self.count.swap(0, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn differing_lines_count_up() {
        let dec = QuadratureDecoder::new(false);
        dec.on_clock_edge(true, false);
        assert_eq!(dec.take_delta(), 1);
    }

    #[test]
    fn matching_lines_count_down() {
        let dec = QuadratureDecoder::new(false);
        dec.on_clock_edge(true, true);
        assert_eq!(dec.take_delta(), -1);
    }

    #[test]
    fn refire_without_clock_change_is_ignored() {
        let dec = QuadratureDecoder::new(true);
        dec.on_clock_edge(true, false);
        dec.on_clock_edge(true, true);
        assert_eq!(dec.take_delta(), 0);
    }

    #[test]
    fn take_delta_clears() {
        let dec = QuadratureDecoder::new(false);
        dec.on_clock_edge(true, false);
        dec.on_clock_edge(false, true);
        assert_eq!(dec.take_delta(), 2);
        assert_eq!(dec.take_delta(), 0);
    }

    #[test]
    fn opposite_turns_coalesce() {
        let dec = QuadratureDecoder::new(false);
        dec.on_clock_edge(true, false); // +1
        dec.on_clock_edge(false, false); // -1
        dec.on_clock_edge(true, false); // +1
        assert_eq!(dec.take_delta(), 1);
    }

    proptest! {
        #[test]
        fn direction_follows_equal_differ_rule(prev in any::<bool>(), clk in any::<bool>(), dt in any::<bool>()) {
            let dec = QuadratureDecoder::new(prev);
            dec.on_clock_edge(clk, dt);
            let expected = if prev == clk {
                0
            } else if clk != dt {
                1
            } else {
                -1
            };
            prop_assert_eq!(dec.take_delta(), expected);
        }

        #[test]
        fn net_delta_is_sum_of_steps(edges in proptest::collection::vec(any::<bool>(), 0..64)) {
            // Alternate the clock each edge; `dt` picks the direction.
            let dec = QuadratureDecoder::new(false);
            let mut clk = false;
            let mut expected = 0i32;
            for dt in edges {
                clk = !clk;
                dec.on_clock_edge(clk, dt);
                expected += if clk != dt { 1 } else { -1 };
            }
            prop_assert_eq!(dec.take_delta(), expected);
        }
    }
}
