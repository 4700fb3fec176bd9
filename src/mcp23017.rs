//! Register-level driver for the MCP23017 16-bit GPIO expander.
//!
//! The driver owns a connectivity state machine (`Disconnected` →
//! `Connected` → `Ready`) and a cached copy of the chip's input
//! configuration. When the chip drops off the bus, every operation keeps
//! returning caller-safe defaults while the state falls back to
//! `Disconnected`; a later [`Mcp23017::resync`] probes the chip and replays
//! the cached configuration before declaring it `Ready` again. The chip may
//! be hot-unplugged and replugged indefinitely.

use log::{debug, trace, warn};

use crate::bus::BusChannel;
use crate::consts;
use crate::error::{Error, Result};

/// Hardware sub-address of an MCP23017 (the 3 address pins, 0-7).
/// Use `SubAddress::new(n)` to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubAddress(u8);

impl SubAddress {
    /// Creates a sub-address, returning an error if out of range (0-7).
    pub fn new(value: u8) -> Result<Self> {
        if value <= 7 {
            Ok(SubAddress(value))
        } else {
            Err(Error::ArgumentOutOfRange(format!(
                "MCP23017 sub-address {value} out of range (0-7)"
            )))
        }
    }

    /// Returns the full 7-bit bus address for this sub-address.
    pub fn bus_address(&self) -> u16 {
        consts::MCP23017_BASE_ADDRESS + self.0 as u16
    }
}

/// One of the two 8-line GPIO ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

impl Port {
    /// Register offset of the port within a register pair (A = 0, B = 1).
    #[inline]
    pub fn index(self) -> u8 {
        match self {
            Port::A => 0,
            Port::B => 1,
        }
    }
}

/// Register pair bases. Each pair covers port A at the base address and
/// port B at base + 1, and is read or written in one two-byte transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegPair {
    /// I/O direction (1 = input).
    IoDir = 0x00,
    /// Input polarity inversion.
    Ipol = 0x02,
    /// Interrupt-on-change enable.
    GpIntEn = 0x04,
    /// Default compare value for interrupts.
    DefVal = 0x06,
    /// Interrupt-on-change control.
    IntCon = 0x08,
    /// Chip configuration.
    IoCon = 0x0A,
    /// Pull-up resistor enable.
    Gppu = 0x0C,
    /// Interrupt flags.
    IntF = 0x0E,
    /// Port values captured at interrupt time.
    IntCap = 0x10,
    /// Live port values.
    Gpio = 0x12,
    /// Output latches.
    Olat = 0x14,
}

impl RegPair {
    /// Base register address of the pair (the port A register).
    #[inline]
    pub fn base(self) -> u8 {
        self as u8
    }

    /// Single-register address for one port of the pair.
    #[inline]
    pub fn reg(self, port: Port) -> u8 {
        self as u8 + port.index()
    }
}

/// Connectivity state of one expander chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Chip absent or not yet probed. Reads yield zeros, writes no-op.
    Disconnected,
    /// Probe succeeded; cached configuration not yet replayed.
    Connected,
    /// Configuration replayed; port reads are meaningful.
    Ready,
}

/// Cached configuration register values, one byte per port, replayed on
/// every successful reconnect.
#[derive(Debug, Clone, Copy)]
struct PortConfig {
    direction: (u8, u8),
    polarity: (u8, u8),
    pullups: (u8, u8),
}

impl PortConfig {
    /// Chip reset defaults: all pins inputs, no inversion, no pull-ups.
    fn reset_defaults() -> Self {
        PortConfig {
            direction: (0xFF, 0xFF),
            polarity: (0x00, 0x00),
            pullups: (0x00, 0x00),
        }
    }
}

/// Driver for one MCP23017 chip on an addressed bus.
#[derive(Debug)]
pub struct Mcp23017<C: BusChannel> {
    channel: C,
    address: u16,
    timeout_ms: i32,
    status: Status,
    config: PortConfig,
}

impl<C: BusChannel> Mcp23017<C> {
    /// Creates a driver bound to one chip. The chip starts `Disconnected`;
    /// the configuration cache holds the chip's reset defaults until the
    /// first explicit `set_*` call.
    pub fn new(channel: C, subaddress: SubAddress) -> Self {
        Mcp23017 {
            channel,
            address: subaddress.bus_address(),
            timeout_ms: consts::DEFAULT_BUS_TIMEOUT_MS,
            status: Status::Disconnected,
            config: PortConfig::reset_defaults(),
        }
    }

    /// Overrides the per-transaction timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Current connectivity state.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Bus address this driver is bound to.
    pub fn address(&self) -> u16 {
        self.address
    }

    // --- Raw transactions (errors surface here, classification below) ---

    fn raw_read(&mut self, reg: u8, len: usize) -> Result<Vec<u8>> {
        let data = self
            .channel
            .send_then_receive(self.address, &[reg], len, self.timeout_ms)?;
        if data.len() < len {
            return Err(Error::ShortTransfer {
                expected: len,
                actual: data.len(),
            });
        }
        trace!("read reg 0x{reg:02X}: {data:02X?}");
        Ok(data)
    }

    fn raw_write(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("write: {bytes:02X?}");
        self.channel.send(self.address, bytes, self.timeout_ms)
    }

    /// Applies the failure contract to a finished transaction: bus-tier
    /// errors force `Disconnected` and yield `default`; anything else is
    /// wrapped with operation context and re-raised. Any failure, from any
    /// state, lands in `Disconnected`.
    fn absorb<T>(&mut self, op: &'static str, reg: u8, result: Result<T>, default: T) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_bus_error() => {
                warn!(
                    "{op} on expander 0x{:02X}: {e}; marking disconnected",
                    self.address
                );
                self.status = Status::Disconnected;
                Ok(default)
            }
            Err(e) => {
                warn!(
                    "{op} on expander 0x{:02X} at register 0x{reg:02X}: unexpected failure: {e}",
                    self.address
                );
                self.status = Status::Disconnected;
                Err(Error::RegisterAccess {
                    op,
                    reg,
                    source: Box::new(e),
                })
            }
        }
    }

    // --- General register access ---

    /// Reads one register. A dropped bus yields `0`.
    pub fn read_register(&mut self, reg: u8) -> Result<u8> {
        let result = self.raw_read(reg, 1).map(|d| d[0]);
        self.absorb("read_register", reg, result, 0)
    }

    /// Writes one register. A dropped bus turns this into a no-op.
    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        let result = self.raw_write(&[reg, value]);
        self.absorb("write_register", reg, result, ())
    }

    /// Reads a register pair (port A, port B) in one transaction.
    /// A dropped bus yields `(0, 0)`.
    pub fn read_register_pair(&mut self, pair: RegPair) -> Result<(u8, u8)> {
        let result = self.raw_read(pair.base(), 2).map(|d| (d[0], d[1]));
        self.absorb("read_register_pair", pair.base(), result, (0, 0))
    }

    /// Writes a register pair (port A, port B) in one transaction.
    pub fn write_register_pair(&mut self, pair: RegPair, a: u8, b: u8) -> Result<()> {
        let result = self.raw_write(&[pair.base(), a, b]);
        self.absorb("write_register_pair", pair.base(), result, ())
    }

    // --- Port state ---

    /// Reads the live value of one port.
    pub fn read_port(&mut self, port: Port) -> Result<u8> {
        self.read_register(RegPair::Gpio.reg(port))
    }

    /// Reads the live value of both ports in one transaction.
    pub fn read_both_ports(&mut self) -> Result<(u8, u8)> {
        self.read_register_pair(RegPair::Gpio)
    }

    // --- Configuration (writes the chip and updates the replay cache) ---

    /// Sets the I/O direction of one port (1 = input).
    pub fn set_port_direction(&mut self, port: Port, direction: u8) -> Result<()> {
        self.write_register(RegPair::IoDir.reg(port), direction)?;
        match port {
            Port::A => self.config.direction.0 = direction,
            Port::B => self.config.direction.1 = direction,
        }
        Ok(())
    }

    /// Sets the I/O direction of both ports (1 = input).
    pub fn set_ports_direction(&mut self, a: u8, b: u8) -> Result<()> {
        self.write_register_pair(RegPair::IoDir, a, b)?;
        self.config.direction = (a, b);
        Ok(())
    }

    /// Sets the input polarity inversion of one port (1 = inverted).
    pub fn set_port_polarity(&mut self, port: Port, polarity: u8) -> Result<()> {
        self.write_register(RegPair::Ipol.reg(port), polarity)?;
        match port {
            Port::A => self.config.polarity.0 = polarity,
            Port::B => self.config.polarity.1 = polarity,
        }
        Ok(())
    }

    /// Sets the input polarity inversion of both ports (1 = inverted).
    pub fn set_ports_polarity(&mut self, a: u8, b: u8) -> Result<()> {
        self.write_register_pair(RegPair::Ipol, a, b)?;
        self.config.polarity = (a, b);
        Ok(())
    }

    /// Enables pull-up resistors on one port (1 = enabled).
    pub fn set_port_pullups(&mut self, port: Port, pullups: u8) -> Result<()> {
        self.write_register(RegPair::Gppu.reg(port), pullups)?;
        match port {
            Port::A => self.config.pullups.0 = pullups,
            Port::B => self.config.pullups.1 = pullups,
        }
        Ok(())
    }

    /// Enables pull-up resistors on both ports (1 = enabled).
    pub fn set_ports_pullups(&mut self, a: u8, b: u8) -> Result<()> {
        self.write_register_pair(RegPair::Gppu, a, b)?;
        self.config.pullups = (a, b);
        Ok(())
    }

    // --- Reconnect / resync ---

    /// Probes the chip and, if it answers, replays the cached configuration.
    ///
    /// From `Disconnected`: a successful probe (a read of the live GPIO
    /// register, which is not part of the cached configuration) advances to
    /// `Connected`; a successful replay of direction, polarity and pull-ups
    /// then advances to `Ready`. Any failure along the way lands back in
    /// `Disconnected`. Returns the resulting state.
    pub fn resync(&mut self) -> Result<Status> {
        let probe = self.raw_read(RegPair::Gpio.base(), 1).map(|_| true);
        if !self.absorb("resync probe", RegPair::Gpio.base(), probe, false)? {
            return Ok(self.status);
        }
        self.status = Status::Connected;
        debug!("expander 0x{:02X} answered probe, replaying config", self.address);

        let replay = self.replay_config().map(|_| true);
        if self.absorb("resync replay", RegPair::IoDir.base(), replay, false)? {
            self.status = Status::Ready;
            debug!("expander 0x{:02X} ready", self.address);
        }
        Ok(self.status)
    }

    fn replay_config(&mut self) -> Result<()> {
        let config = self.config;
        self.raw_write(&[RegPair::IoDir.base(), config.direction.0, config.direction.1])?;
        self.raw_write(&[RegPair::Ipol.base(), config.polarity.0, config.polarity.1])?;
        self.raw_write(&[RegPair::Gppu.base(), config.pullups.0, config.pullups.1])?;
        Ok(())
    }
}
