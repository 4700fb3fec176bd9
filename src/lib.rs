//! # pedalboard-midi
//!
//! Core logic for a foot-pedal MIDI controller: up to 30 momentary switches
//! wired through two MCP23017 16-bit GPIO expanders on a shared bus are
//! sampled every 10 ms, state transitions become MIDI Note On/Off events,
//! and the events go to a host over a USB bulk MIDI-streaming interface.
//! Inbound MIDI bytes can optionally be echoed back out (pass-through).
//!
//! ## Components
//!
//! *   [`mcp23017::Mcp23017`] — resilient register-level expander driver.
//!     Owns a `Disconnected` → `Connected` → `Ready` connectivity state
//!     machine and a cached input configuration it replays after every
//!     reconnect; transient bus failures never propagate past it.
//! *   [`midi_client::UsbMidiClient`] — USB MIDI class driver. Discovers a
//!     MIDI-streaming interface (class 0x01, subclass 0x03) on device
//!     attach, manages the two bulk transfer buffers, and exposes
//!     `send_note` / `send_local_control` / pass-through plus a
//!     `connected()` predicate. Stack callbacks only flip bits in a
//!     pending-action set; a dedicated thread does the real work.
//! *   [`pedals::PedalSampler`] — assembles the 30-bit pedal snapshot from
//!     both expanders and exposes the rising/falling edge masks.
//! *   [`controller::Controller`] — the fixed-period main cycle gluing the
//!     three together.
//!
//! The two transports are consumed through traits and supplied by the
//! embedding application: [`bus::BusChannel`] for the expander bus and
//! [`usb::HostStack`] for the USB host stack.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use pedalboard_midi::{
//!     BusChannel, Controller, HostStack, Mcp23017, PedalSampler, SubAddress, UsbMidiClient,
//! };
//!
//! fn start<C: BusChannel>(
//!     bus0: C,
//!     bus1: C,
//!     stack: Arc<dyn HostStack>,
//! ) -> pedalboard_midi::Result<()> {
//!     let low = Mcp23017::new(bus0, SubAddress::new(0)?);
//!     let high = Mcp23017::new(bus1, SubAddress::new(1)?);
//!
//!     let client = UsbMidiClient::new(stack);
//!     client.spawn();
//!
//!     let sampler = PedalSampler::new(low, high);
//!     let mut controller = Controller::new(sampler, client, true)?;
//!     controller.run()
//! }
//! ```
//!
//! ## Notes
//!
//! *   Every `send_note` call emits a second note a configurable interval
//!     above the requested one (default 7 semitones); see
//!     [`midi_client::UsbMidiClient::set_chord_interval`].
//! *   Switch bounce is only filtered by the 10 ms sampling period.

pub mod bus;
pub mod consts;
pub mod controller;
pub mod error;
pub mod mcp23017;
pub mod midi_client;
pub mod pedals;
pub mod usb;

pub use bus::BusChannel;
pub use controller::{Controller, CYCLE_PERIOD};
pub use error::{Error, Result};
pub use mcp23017::{Mcp23017, Port, RegPair, Status, SubAddress};
pub use midi_client::UsbMidiClient;
pub use pedals::{
    falling_edges, note_for_bit, rising_edges, PedalSampler, DEFAULT_BASE_NOTE, PEDAL_COUNT,
    PEDAL_MASK,
};
pub use usb::{HostStack, StackEvent};
