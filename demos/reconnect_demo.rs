//! Expander Reconnect Demo
//!
//! Demonstrates the MCP23017 driver's connectivity state machine on a
//! simulated bus that drops out mid-run. No hardware required.
//!
//! The driver guarantees:
//! - A dropped bus never propagates an error to the sampling loop; reads
//!   come back all-released instead.
//! - The input configuration written before the dropout is replayed
//!   automatically when the chip answers again.
//!
//! Run with logging to watch the state transitions:
//!
//! ```text
//! RUST_LOG=debug cargo run --example reconnect_demo
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use pedalboard_midi::{
    falling_edges, rising_edges, BusChannel, Error, Mcp23017, PedalSampler, Result, Status,
    SubAddress,
};

/// In-process bus with a register file and an on/off connectivity switch.
#[derive(Debug, Default)]
struct SimState {
    regs: [u8; 0x16],
    unplugged: bool,
}

#[derive(Debug, Clone, Default)]
struct SimBus(Rc<RefCell<SimState>>);

impl SimBus {
    fn unplug(&self, unplugged: bool) {
        self.0.borrow_mut().unplugged = unplugged;
    }

    fn press(&self, a: u8, b: u8) {
        let mut state = self.0.borrow_mut();
        state.regs[0x12] = a;
        state.regs[0x13] = b;
    }
}

impl BusChannel for SimBus {
    fn send(&mut self, address: u16, bytes: &[u8], _timeout_ms: i32) -> Result<()> {
        let mut state = self.0.borrow_mut();
        if state.unplugged {
            return Err(Error::BusTimeout { address });
        }
        let reg = bytes[0] as usize;
        for (i, value) in bytes[1..].iter().enumerate() {
            state.regs[reg + i] = *value;
        }
        Ok(())
    }

    fn receive(&mut self, address: u16, len: usize, _timeout_ms: i32) -> Result<Vec<u8>> {
        if self.0.borrow().unplugged {
            return Err(Error::BusTimeout { address });
        }
        Ok(vec![0; len])
    }

    fn send_then_receive(
        &mut self,
        address: u16,
        out: &[u8],
        in_len: usize,
        _timeout_ms: i32,
    ) -> Result<Vec<u8>> {
        let state = self.0.borrow();
        if state.unplugged {
            return Err(Error::BusTimeout { address });
        }
        let reg = out[0] as usize;
        Ok((0..in_len).map(|i| state.regs[reg + i]).collect())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== MCP23017 Reconnect Demo ===\n");

    let low_bus = SimBus::default();
    let high_bus = SimBus::default();
    let low = Mcp23017::new(low_bus.clone(), SubAddress::new(0)?);
    let high = Mcp23017::new(high_bus.clone(), SubAddress::new(1)?);
    let mut sampler = PedalSampler::new(low, high);
    sampler.configure_inputs()?;

    // Scripted run: (cycle, action).
    println!("cycle  pedal vector                    presses   releases");
    let mut prev_status = None;
    for cycle in 0..12 {
        match cycle {
            2 => low_bus.press(0x05, 0x00),
            4 => {
                println!("       -- low expander unplugged --");
                low_bus.unplug(true);
            }
            7 => {
                println!("       -- low expander replugged --");
                low_bus.unplug(false);
                low_bus.press(0x01, 0x00);
            }
            10 => low_bus.press(0x00, 0x00),
            _ => {}
        }

        let previous = sampler.current();
        let current = sampler.sample()?;
        println!(
            "{cycle:>5}  {current:030b}  {:08X}  {:08X}",
            rising_edges(previous, current),
            falling_edges(previous, current),
        );

        let status = sampler.low_status();
        if prev_status != Some(status) {
            println!("       low expander now {status:?}");
            prev_status = Some(status);
        }
    }

    assert_eq!(sampler.low_status(), Status::Ready);
    println!("\nConfiguration was replayed after the replug; no error ever escaped.");
    Ok(())
}
