//! Wire-level constants: bus addressing, USB interface selection, MIDI packets.

/// MCP23017 base bus address. The full 7-bit address is `0b0100nnn`
/// with the 3 `nnn` bits set by the chip's hardware sub-address pins.
pub const MCP23017_BASE_ADDRESS: u16 = 0x20;

/// Default per-transaction bus timeout.
pub const DEFAULT_BUS_TIMEOUT_MS: i32 = 50;

// --- USB Related Constants ---
pub mod usb {
    /// Device class meaning "class is declared per interface".
    pub const CLASS_PER_INTERFACE: u8 = 0x00;
    /// Interface class: Audio.
    pub const CLASS_AUDIO: u8 = 0x01;
    /// Interface subclass: MIDIStreaming.
    pub const SUBCLASS_MIDI_STREAMING: u8 = 0x03;
    /// Direction bit of an endpoint address (set = IN).
    pub const ENDPOINT_DIR_IN: u8 = 0x80;
}

// --- USB-MIDI Event Packet Constants ---
// Every event is 4 bytes: [cable/CIN][MIDI status][data1][data2].
pub mod midi {
    /// Leading byte of every event packet emitted by this device
    /// (cable 0, CIN 0x8).
    pub const EVENT_HEADER: u8 = 0x08;
    /// MIDI status byte: Note On, channel 1.
    pub const STATUS_NOTE_ON: u8 = 0x90;
    /// MIDI status byte: Note Off, channel 1.
    pub const STATUS_NOTE_OFF: u8 = 0x80;
    /// MIDI status byte: Control Change, channel 1.
    pub const STATUS_CONTROL_CHANGE: u8 = 0xB0;
    /// Controller number for Local Control.
    pub const CC_LOCAL_CONTROL: u8 = 0x7A;
    /// Local Control value: on.
    pub const LOCAL_CONTROL_ON: u8 = 0x7F;
    /// Local Control value: off.
    pub const LOCAL_CONTROL_OFF: u8 = 0x00;
    /// Fixed note velocity (64/127).
    pub const VELOCITY: u8 = 0x40;
    /// Size of one event packet in bytes.
    pub const EVENT_PACKET_LEN: usize = 4;
    /// Default interval, in semitones, of the second note emitted above
    /// every requested note. See [`crate::midi_client::UsbMidiClient::set_chord_interval`].
    pub const DEFAULT_CHORD_INTERVAL: u8 = 7;
}
