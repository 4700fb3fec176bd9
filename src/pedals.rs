//! Pedal state sampling and edge detection.
//!
//! Once per cycle the sampler polls the two expander chips and assembles a
//! 30-bit snapshot of every switch, most significant byte pair from the
//! second chip. The expanders invert input polarity so a pressed (grounded)
//! switch reads logical 1: presses are rising edges, releases falling.

use log::debug;

use crate::bus::BusChannel;
use crate::error::Result;
use crate::mcp23017::{Mcp23017, Status};

/// Number of switches on the pedalboard.
pub const PEDAL_COUNT: u32 = 30;

/// Mask of the significant bits of a pedal bit vector.
pub const PEDAL_MASK: u32 = (1 << PEDAL_COUNT) - 1;

/// MIDI note emitted for pedal bit 0 (middle C).
pub const DEFAULT_BASE_NOTE: u8 = 0x3C;

/// Bits that were set in `previous` and cleared in `current` (releases).
#[inline]
pub fn falling_edges(previous: u32, current: u32) -> u32 {
    (previous & !current) & PEDAL_MASK
}

/// Bits that were clear in `previous` and set in `current` (presses).
#[inline]
pub fn rising_edges(previous: u32, current: u32) -> u32 {
    (!previous & current) & PEDAL_MASK
}

/// MIDI note number for one pedal bit.
#[inline]
pub fn note_for_bit(base_note: u8, bit: u32) -> u8 {
    base_note + bit as u8
}

/// Polls the two expanders and keeps the current and previous-cycle pedal
/// bit vectors.
#[derive(Debug)]
pub struct PedalSampler<C: BusChannel> {
    /// Second chip: most significant byte pair (pedal bits 16-29).
    high: Mcp23017<C>,
    /// First chip: least significant byte pair (pedal bits 0-15).
    low: Mcp23017<C>,
    current: u32,
    previous: u32,
}

impl<C: BusChannel> PedalSampler<C> {
    pub fn new(low: Mcp23017<C>, high: Mcp23017<C>) -> Self {
        PedalSampler {
            high,
            low,
            current: 0,
            previous: 0,
        }
    }

    /// Writes the pedal input configuration to both expanders: every pin an
    /// input, polarity inverted (pressed reads 1), pull-ups enabled. The
    /// values land in each driver's replay cache, so a chip that was absent
    /// here still gets configured by its first successful resync.
    pub fn configure_inputs(&mut self) -> Result<()> {
        for expander in [&mut self.high, &mut self.low] {
            expander.set_ports_direction(0xFF, 0xFF)?;
            expander.set_ports_polarity(0xFF, 0xFF)?;
            expander.set_ports_pullups(0xFF, 0xFF)?;
        }
        Ok(())
    }

    /// Executes one sampling cycle and returns the new bit vector.
    ///
    /// Each expander contributes 16 bits, second chip first. A chip that is
    /// not `Ready` contributes zeros for this cycle and gets a resync
    /// attempt as a side effect.
    pub fn sample(&mut self) -> Result<u32> {
        self.previous = self.current;
        let mut bits: u32 = 0;
        for expander in [&mut self.high, &mut self.low] {
            bits <<= 16;
            if expander.status() == Status::Ready {
                let (a, b) = expander.read_both_ports()?;
                bits |= (b as u32) << 8 | a as u32;
            } else {
                expander.resync()?;
            }
        }
        self.current = bits & PEDAL_MASK;
        if self.changed() {
            debug!("pedal state {:030b}", self.current);
        }
        Ok(self.current)
    }

    /// True if the last cycle changed the bit vector.
    pub fn changed(&self) -> bool {
        self.current != self.previous
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn previous(&self) -> u32 {
        self.previous
    }

    /// Connectivity state of the first chip (pedal bits 0-15).
    pub fn low_status(&self) -> Status {
        self.low.status()
    }

    /// Connectivity state of the second chip (pedal bits 16-29).
    pub fn high_status(&self) -> Status {
        self.high.status()
    }
}
