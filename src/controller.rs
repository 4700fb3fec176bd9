//! Main cycle: ties the sampler, the edge translator and the MIDI class
//! driver together on a fixed period.

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::bus::BusChannel;
use crate::error::Result;
use crate::midi_client::UsbMidiClient;
use crate::pedals::{falling_edges, note_for_bit, rising_edges, PedalSampler, DEFAULT_BASE_NOTE, PEDAL_COUNT};

/// Sampling period. This is the sampling resolution and the only switch
/// debounce applied: contacts that bounce faster than this will emit
/// spurious note pairs.
pub const CYCLE_PERIOD: Duration = Duration::from_millis(10);

/// The pedalboard main loop.
pub struct Controller<C: BusChannel> {
    sampler: PedalSampler<C>,
    client: UsbMidiClient,
    base_note: u8,
    /// Set once the initial MIDI configuration went out after a USB
    /// connect; cleared on disconnect. Note emission is gated on it.
    midi_config_sent: bool,
}

impl<C: BusChannel> Controller<C> {
    /// Builds the controller, applies the pedal input configuration to both
    /// expanders and fixes the pass-through setting.
    pub fn new(
        mut sampler: PedalSampler<C>,
        client: UsbMidiClient,
        pass_through: bool,
    ) -> Result<Self> {
        sampler.configure_inputs()?;
        client.set_pass_through(pass_through);
        Ok(Controller {
            sampler,
            client,
            base_note: DEFAULT_BASE_NOTE,
            midi_config_sent: false,
        })
    }

    /// Overrides the MIDI note emitted for pedal bit 0.
    pub fn with_base_note(mut self, base_note: u8) -> Self {
        self.base_note = base_note;
        self
    }

    /// True once the post-connect MIDI configuration has been sent.
    pub fn configured(&self) -> bool {
        self.midi_config_sent
    }

    /// Executes one cycle: sample, translate edges to notes, track the USB
    /// connection.
    pub fn run_cycle(&mut self) -> Result<()> {
        self.sampler.sample()?;

        if self.sampler.changed() {
            let falling = falling_edges(self.sampler.previous(), self.sampler.current());
            let rising = rising_edges(self.sampler.previous(), self.sampler.current());
            if self.midi_config_sent {
                for bit in 0..PEDAL_COUNT {
                    if falling & (1 << bit) != 0 {
                        debug!("note off: pedal {bit}");
                        self.client.send_note(false, note_for_bit(self.base_note, bit))?;
                    }
                }
                for bit in 0..PEDAL_COUNT {
                    if rising & (1 << bit) != 0 {
                        debug!("note on: pedal {bit}");
                        self.client.send_note(true, note_for_bit(self.base_note, bit))?;
                    }
                }
            }
        }

        if self.client.connected() {
            if !self.midi_config_sent {
                info!("MIDI device connected, sending initial configuration");
                self.client.send_local_control(false)?;
                self.midi_config_sent = true;
            }
        } else if self.midi_config_sent {
            info!("MIDI device disconnected");
            self.midi_config_sent = false;
        }
        Ok(())
    }

    /// Runs cycles forever at [`CYCLE_PERIOD`].
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.run_cycle()?;
            thread::sleep(CYCLE_PERIOD);
        }
    }
}
