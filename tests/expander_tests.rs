//! Unit tests for the MCP23017 register driver: addressing, the
//! reconnect/resync state machine, and the two-tier failure contract.
//! No hardware required; the bus is a scripted in-process mock.

use std::sync::{Arc, Mutex};

use pedalboard_midi::bus::BusChannel;
use pedalboard_midi::mcp23017::{Mcp23017, Port, RegPair, Status, SubAddress};
use pedalboard_midi::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailMode {
    Timeout,
    Busy,
    Fault,
}

#[derive(Debug, Default)]
struct BusState {
    regs: [u8; 0x16],
    fail: Option<FailMode>,
    /// Successful transactions remaining before every further one fails
    /// with a timeout.
    fail_after: Option<usize>,
    writes: Vec<Vec<u8>>,
}

/// One mock per chip; the register file plays both ports of that chip.
#[derive(Debug, Clone, Default)]
struct MockBus(Arc<Mutex<BusState>>);

impl MockBus {
    fn set_fail(&self, mode: Option<FailMode>) {
        self.0.lock().unwrap().fail = mode;
    }

    fn fail_after(&self, transactions: usize) {
        self.0.lock().unwrap().fail_after = Some(transactions);
    }

    fn set_reg(&self, reg: u8, value: u8) {
        self.0.lock().unwrap().regs[reg as usize] = value;
    }

    fn reg(&self, reg: u8) -> u8 {
        self.0.lock().unwrap().regs[reg as usize]
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().writes.clone()
    }

    fn check_fail(state: &mut BusState, address: u16) -> Result<()> {
        if let Some(mode) = state.fail {
            return Err(match mode {
                FailMode::Timeout => Error::BusTimeout { address },
                FailMode::Busy => Error::BusBusy { address },
                FailMode::Fault => Error::BusFault {
                    address,
                    message: "simulated transport fault".into(),
                },
            });
        }
        if let Some(remaining) = state.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(Error::BusTimeout { address });
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

impl BusChannel for MockBus {
    fn send(&mut self, address: u16, bytes: &[u8], _timeout_ms: i32) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        Self::check_fail(&mut state, address)?;
        state.writes.push(bytes.to_vec());
        let reg = bytes[0] as usize;
        for (i, value) in bytes[1..].iter().enumerate() {
            state.regs[reg + i] = *value;
        }
        Ok(())
    }

    fn receive(&mut self, address: u16, len: usize, _timeout_ms: i32) -> Result<Vec<u8>> {
        let mut state = self.0.lock().unwrap();
        Self::check_fail(&mut state, address)?;
        Ok(vec![0; len])
    }

    fn send_then_receive(
        &mut self,
        address: u16,
        out: &[u8],
        in_len: usize,
        _timeout_ms: i32,
    ) -> Result<Vec<u8>> {
        let mut state = self.0.lock().unwrap();
        Self::check_fail(&mut state, address)?;
        let reg = out[0] as usize;
        Ok((0..in_len).map(|i| state.regs[reg + i]).collect())
    }
}

fn driver(bus: &MockBus) -> Mcp23017<MockBus> {
    Mcp23017::new(bus.clone(), SubAddress::new(0).unwrap())
}

#[test]
fn register_pair_addressing_matches_map() {
    let pairs = [
        (RegPair::IoDir, 0x00),
        (RegPair::Ipol, 0x02),
        (RegPair::GpIntEn, 0x04),
        (RegPair::DefVal, 0x06),
        (RegPair::IntCon, 0x08),
        (RegPair::IoCon, 0x0A),
        (RegPair::Gppu, 0x0C),
        (RegPair::IntF, 0x0E),
        (RegPair::IntCap, 0x10),
        (RegPair::Gpio, 0x12),
        (RegPair::Olat, 0x14),
    ];
    for (pair, base) in pairs {
        assert_eq!(pair.base(), base, "{pair:?} base");
        assert_eq!(pair.reg(Port::A), base, "{pair:?} port A");
        assert_eq!(pair.reg(Port::B), base + 1, "{pair:?} port B");
    }
}

#[test]
fn sub_address_range() {
    assert!(SubAddress::new(0).is_ok());
    assert!(SubAddress::new(7).is_ok());
    assert!(SubAddress::new(8).is_err());
    assert_eq!(SubAddress::new(3).unwrap().bus_address(), 0x23);
}

#[test]
fn starts_disconnected_and_resyncs_to_ready() {
    let bus = MockBus::default();
    let mut exp = driver(&bus);
    assert_eq!(exp.status(), Status::Disconnected);
    assert_eq!(exp.resync().unwrap(), Status::Ready);
    assert_eq!(exp.status(), Status::Ready);
}

#[test]
fn failed_probe_stays_disconnected() {
    let bus = MockBus::default();
    bus.set_fail(Some(FailMode::Timeout));
    let mut exp = driver(&bus);
    assert_eq!(exp.resync().unwrap(), Status::Disconnected);
    assert_eq!(exp.status(), Status::Disconnected);
}

#[test]
fn failed_replay_returns_to_disconnected() {
    let bus = MockBus::default();
    // Probe succeeds, first replay write times out.
    bus.fail_after(1);
    let mut exp = driver(&bus);
    assert_eq!(exp.resync().unwrap(), Status::Disconnected);
}

#[test]
fn operation_failure_drops_ready_state() {
    let bus = MockBus::default();
    let mut exp = driver(&bus);
    exp.resync().unwrap();
    assert_eq!(exp.status(), Status::Ready);

    bus.set_fail(Some(FailMode::Timeout));
    assert_eq!(exp.read_port(Port::A).unwrap(), 0);
    assert_eq!(exp.status(), Status::Disconnected);
}

#[test]
fn bus_error_yields_zero_defaults() {
    let bus = MockBus::default();
    bus.set_reg(RegPair::Gpio.base(), 0xAB);
    let mut exp = driver(&bus);
    assert_eq!(exp.read_port(Port::A).unwrap(), 0xAB);

    for mode in [FailMode::Timeout, FailMode::Busy] {
        bus.set_fail(Some(mode));
        // Reads come back zero-filled, writes no-op; nothing propagates.
        assert_eq!(exp.read_register(0x12).unwrap(), 0);
        assert_eq!(exp.read_both_ports().unwrap(), (0, 0));
        assert!(exp.write_register(0x00, 0xFF).is_ok());
        assert!(exp.set_ports_pullups(0xFF, 0xFF).is_ok());
        assert_eq!(exp.status(), Status::Disconnected);
        bus.set_fail(None);
    }
}

#[test]
fn driver_fault_is_reraised_with_context() {
    let bus = MockBus::default();
    bus.set_fail(Some(FailMode::Fault));
    let mut exp = driver(&bus);
    let err = exp.read_register(0x12).unwrap_err();
    match err {
        Error::RegisterAccess { op, reg, source } => {
            assert_eq!(op, "read_register");
            assert_eq!(reg, 0x12);
            assert!(!source.is_bus_error());
        }
        other => panic!("expected RegisterAccess, got {other:?}"),
    }
    assert_eq!(exp.status(), Status::Disconnected);
}

#[test]
fn config_writes_hit_the_right_registers() {
    let bus = MockBus::default();
    let mut exp = driver(&bus);
    exp.set_ports_direction(0xFF, 0x0F).unwrap();
    exp.set_port_polarity(Port::B, 0xAA).unwrap();
    exp.set_ports_pullups(0x55, 0x66).unwrap();

    assert_eq!(bus.reg(0x00), 0xFF); // IODIRA
    assert_eq!(bus.reg(0x01), 0x0F); // IODIRB
    assert_eq!(bus.reg(0x03), 0xAA); // IPOLB
    assert_eq!(bus.reg(0x0C), 0x55); // GPPUA
    assert_eq!(bus.reg(0x0D), 0x66); // GPPUB

    let writes = bus.writes();
    assert!(writes.contains(&vec![0x00, 0xFF, 0x0F]));
    assert!(writes.contains(&vec![0x03, 0xAA]));
    assert!(writes.contains(&vec![0x0C, 0x55, 0x66]));
}

#[test]
fn resync_replays_cached_config() {
    let bus = MockBus::default();
    let mut exp = driver(&bus);

    // Configuration written while the chip is alive...
    exp.set_ports_direction(0xFF, 0xFF).unwrap();
    exp.set_ports_polarity(0xFF, 0xFF).unwrap();
    exp.set_ports_pullups(0xFF, 0xFF).unwrap();

    // ...survives a chip swap: the replacement answers with reset defaults
    // and resync rewrites the cached values.
    for reg in [0x00u8, 0x01, 0x02, 0x03, 0x0C, 0x0D] {
        bus.set_reg(reg, 0);
    }
    assert_eq!(exp.resync().unwrap(), Status::Ready);
    for reg in [0x00u8, 0x01, 0x02, 0x03, 0x0C, 0x0D] {
        assert_eq!(bus.reg(reg), 0xFF, "register 0x{reg:02X} not replayed");
    }
}

#[test]
fn config_set_while_disconnected_is_replayed_later() {
    let bus = MockBus::default();
    bus.set_fail(Some(FailMode::Timeout));
    let mut exp = driver(&bus);

    // Writes no-op on the wire but still land in the replay cache.
    exp.set_ports_polarity(0xFF, 0xFF).unwrap();
    assert_eq!(bus.reg(0x02), 0);

    bus.set_fail(None);
    assert_eq!(exp.resync().unwrap(), Status::Ready);
    assert_eq!(bus.reg(0x02), 0xFF);
    assert_eq!(bus.reg(0x03), 0xFF);
}
